// Presentation-facing layer
//
// - controller: turns user actions into analysis cycles
// - console: renders state changes for the terminal

pub mod console;
pub mod controller;

pub use console::ConsolePresenter;
pub use controller::ClassifierController;
