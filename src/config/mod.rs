use crate::models::{DisposalRule, RuleSet, RulesConfig, UserConfig};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use indexmap::IndexMap;
use std::fs;

/// Default directory holding the YAML files.
pub const DEFAULT_CONFIG_DIR: &str = "WasteSort Data";

/// Configuration manager for loading and saving YAML configuration files.
///
/// Manages two configuration files:
/// - User config (`WasteSort Config.yaml`): Oracle, decoder and logging settings
/// - Rules config (`WasteSort Rules.yaml`): Per-location disposal rules for text lookup
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    user_config_path: Utf8PathBuf,
    rules_config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing configuration files (e.g., "WasteSort Data")
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            user_config_path: config_dir.join("WasteSort Config.yaml"),
            rules_config_path: config_dir.join("WasteSort Rules.yaml"),
            config_dir,
        })
    }

    /// Load the user configuration file.
    ///
    /// # Returns
    /// The loaded UserConfig, or default if file doesn't exist
    pub fn load_user_config(&self) -> Result<UserConfig> {
        if !self.user_config_path.exists() {
            tracing::warn!(
                "User config file not found at {}, using defaults",
                self.user_config_path
            );
            return Ok(UserConfig::default());
        }

        let file_contents = fs::read_to_string(&self.user_config_path)
            .with_context(|| format!("Failed to read user config: {}", self.user_config_path))?;

        let config: UserConfig = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse user config: {}", self.user_config_path))?;

        tracing::info!("Loaded user config from {}", self.user_config_path);
        Ok(config)
    }

    /// Save the user configuration file.
    pub fn save_user_config(&self, config: &UserConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize user config to YAML")?;

        fs::write(&self.user_config_path, yaml_string)
            .with_context(|| format!("Failed to write user config: {}", self.user_config_path))?;

        tracing::info!("Saved user config to {}", self.user_config_path);
        Ok(())
    }

    /// Load the rules file, writing the built-in rules first if it doesn't exist.
    pub fn load_rules_config(&self) -> Result<RulesConfig> {
        if !self.rules_config_path.exists() {
            tracing::warn!(
                "Rules file not found at {}, writing built-in rules",
                self.rules_config_path
            );
            let rules = create_default_rules();
            self.save_rules_config(&rules)?;
            return Ok(rules);
        }

        let file_contents = fs::read_to_string(&self.rules_config_path)
            .with_context(|| format!("Failed to read rules config: {}", self.rules_config_path))?;

        let config: RulesConfig = serde_yaml_ng::from_str(&file_contents).with_context(|| {
            format!("Failed to parse rules config: {}", self.rules_config_path)
        })?;

        tracing::info!(
            "Loaded rules for {} location(s) from {}",
            config.locations.len(),
            self.rules_config_path
        );
        Ok(config)
    }

    pub fn save_rules_config(&self, config: &RulesConfig) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize rules config to YAML")?;

        fs::write(&self.rules_config_path, yaml_string).with_context(|| {
            format!("Failed to write rules config: {}", self.rules_config_path)
        })?;

        tracing::info!("Saved rules config to {}", self.rules_config_path);
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Resolve a path from the config relative to the config directory.
    pub fn resolve(&self, path: &str) -> Utf8PathBuf {
        let path = Utf8Path::new(path);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }
}

fn rule_map(entries: &[(&str, &str, &str)]) -> IndexMap<String, DisposalRule> {
    entries
        .iter()
        .map(|(item, category, notes)| (item.to_string(), DisposalRule::new(category, notes)))
        .collect()
}

fn alias_map(entries: &[(&str, &str)]) -> IndexMap<String, String> {
    entries
        .iter()
        .map(|(alias, item)| (alias.to_string(), item.to_string()))
        .collect()
}

/// Built-in rules used when no rules file exists yet.
pub fn create_default_rules() -> RulesConfig {
    let aliases = alias_map(&[
        ("apple", "apple core"),
        ("banana", "banana peel"),
        ("peel", "banana peel"),
        ("coffee", "coffee grounds"),
        ("grounds", "coffee grounds"),
        ("tea", "tea bag"),
        ("eggshell", "egg shells"),
        ("bottle", "plastic bottle"),
        ("can", "aluminum can"),
        ("jar", "glass jar"),
        ("box", "cardboard box"),
        ("jug", "milk jug"),
        ("mail", "junk mail"),
        ("bag", "plastic bag"),
        ("wrapper", "candy wrapper"),
        ("straw", "plastic straw"),
        ("foam", "styrofoam"),
        ("cup", "coffee cup"),
        ("bulb", "light bulb"),
        ("batteries", "battery"),
        ("clothes", "clothing"),
        ("foil", "aluminum foil"),
        ("clamshell", "plastic container"),
    ]);

    let fairfax = RuleSet {
        source: "Fairfax County, VA".to_string(),
        rules: rule_map(&[
            ("plastic bottle", "Recyclable", "Empty and rinse. Replace cap. Typically #1, #2 accepted."),
            ("milk jug", "Recyclable", "Empty and rinse. Replace cap. Typically #2 accepted."),
            ("yogurt tub", "Recyclable", "Empty and rinse. Typically #5 accepted."),
            ("cardboard box", "Recyclable", "Flatten. Keep clean and dry. Remove excessive tape."),
            ("cereal box", "Recyclable", "Flatten. Remove plastic liner (trash)."),
            ("paper", "Recyclable", "Clean paper like mail, office paper, magazines, newspapers."),
            ("junk mail", "Recyclable", "Remove plastic windows if possible."),
            ("aluminum can", "Recyclable", "Empty and rinse."),
            ("steel can", "Recyclable", "Empty and rinse."),
            ("glass jar", "Recyclable", "Empty and rinse. Remove metal lids (recycle separately)."),
            ("glass bottle", "Recyclable", "Empty and rinse. Remove metal lids (recycle separately)."),
            ("carton", "Recyclable", "Milk, juice, soup cartons. Empty, rinse, replace cap."),
            ("aluminum foil", "Recyclable", "Clean and balled."),
            ("apple core", "Compost", "Food scraps. Check county drop-off programs or backyard compost."),
            ("banana peel", "Compost", "Food scraps. Check county drop-off programs or backyard compost."),
            ("coffee grounds", "Compost", "Food scraps. Check county drop-off programs or backyard compost."),
            ("tea bag", "Compost", "Remove staple/tag if possible."),
            ("egg shells", "Compost", "Food scraps. Check county drop-off programs or backyard compost."),
            ("leaves", "Yard Waste", "Collected separately during season. Check schedule."),
            ("styrofoam", "Trash", "Not accepted in county recycling."),
            ("plastic bag", "Trash", "Do NOT put in curbside recycling. Check store drop-off programs."),
            ("candy wrapper", "Trash", "Typically multi-layer flexible plastic."),
            ("plastic straw", "Trash", "Generally not recyclable."),
            ("coffee cup", "Trash", "Most disposable coffee cups have a plastic lining."),
            ("pizza box", "Trash", "Often greasy. If completely clean and dry, recycle."),
            ("light bulb", "Trash", "Incandescent/LED bulbs are trash. CFLs contain mercury; use hazardous waste drop-off."),
            ("battery", "Hazardous Waste", "Do NOT put in trash or recycling. Use hazardous waste drop-off."),
            ("electronics", "E-waste", "Do NOT put in trash or recycling. Use e-waste collection events."),
            ("clothing", "Donate/Textile Recycle", "Donate if usable, or find textile recycling drop-offs."),
        ]),
        aliases: aliases.clone(),
    };

    let dc = RuleSet {
        source: "District of Columbia".to_string(),
        rules: rule_map(&[
            ("plastic bottle", "Recyclable", "Empty, rinse, cap ON. Often #1, #2, #5."),
            ("plastic container", "Recyclable", "Empty, rinse. Rigid containers #1, #2, #5 usually ok."),
            ("glass jar", "Recyclable", "Empty, rinse. Lids separate (recycle metal lids)."),
            ("aluminum can", "Recyclable", "Empty and rinse."),
            ("carton", "Recyclable", "Milk, juice, soup cartons. Empty, rinse, caps on."),
            ("cardboard box", "Recyclable", "Flatten. Keep clean and dry."),
            ("paper", "Recyclable", "Mail, office paper, magazines. No shredded paper in curbside."),
            ("aluminum foil", "Recyclable", "Clean and balled up only."),
            ("apple core", "Compost/Trash", "Use the food waste drop-off program."),
            ("banana peel", "Compost/Trash", "Use the food waste drop-off program."),
            ("coffee grounds", "Compost/Trash", "Use the food waste drop-off program."),
            ("plastic bag", "Trash", "Not accepted curbside. Check store drop-off."),
            ("styrofoam", "Trash", "Foam is banned from recycling."),
            ("coffee cup", "Trash", "Lined paper cups are not recyclable."),
            ("battery", "Hazardous Waste", "Take to a household hazardous waste drop-off."),
        ]),
        aliases: aliases.clone(),
    };

    let arlington = RuleSet {
        source: "Arlington County, VA".to_string(),
        rules: rule_map(&[
            ("plastic bottle", "Recyclable", "Empty, rinse, cap on. #1, #2, #5 typically accepted."),
            ("plastic tub", "Recyclable", "Empty, rinse. #5 (yogurt, butter, cottage cheese)."),
            ("plastic container", "Recyclable", "Empty, rinse. Rigid #1-#7 often accepted (no foam)."),
            ("clamshell container", "Recyclable", "Often #1 PET. Empty and clean."),
            ("glass jar", "Recyclable", "Empty, rinse. Lids separate."),
            ("aluminum can", "Recyclable", "Empty and rinse."),
            ("tin can", "Recyclable", "Empty and rinse."),
            ("aerosol can", "Recyclable", "Empty. Remove plastic cap (trash)."),
            ("carton", "Recyclable", "Milk, juice, soup. Empty, rinse, caps on."),
            ("cardboard box", "Recyclable", "Flatten. Keep clean and dry."),
            ("paper", "Recyclable", "Mail, office paper, magazines, paperboard. Shredded paper in a paper bag."),
            ("food scraps", "Compost (Food Scraps Program)", "Curbside food scrap collection accepts meat, dairy and bones."),
            ("apple core", "Compost (Food Scraps Program)", "See 'food scraps'."),
            ("banana peel", "Compost (Food Scraps Program)", "See 'food scraps'."),
            ("coffee grounds", "Compost (Food Scraps Program)", "See 'food scraps'."),
            ("pizza box", "Compost (Food Scraps Program)/Trash", "Food scraps program if participating, otherwise trash the greasy parts."),
            ("styrofoam", "Trash", "Not accepted curbside. Check special drop-off events."),
            ("plastic bag", "Trash", "Do NOT put in curbside recycling. Use store drop-offs."),
            ("chip bag", "Trash", "Multi-layer packaging."),
            ("coffee cup", "Trash", "Most are trash."),
            ("battery", "Hazardous Waste/Drop-off", "Use the county hazardous waste drop-off."),
            ("light bulb", "Trash/Hazardous", "Incandescent/LED are trash. CFLs are hazardous."),
        ]),
        aliases,
    };

    let mut locations = IndexMap::new();
    locations.insert("fairfax".to_string(), fairfax);
    locations.insert("dc".to_string(), dc);
    locations.insert("arlington".to_string(), arlington);

    RulesConfig { locations }
}
