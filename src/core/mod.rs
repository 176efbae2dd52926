// Core modules: path grammar, aliasing, tree access, notification, history, and errors.
pub mod alias;
pub mod error;
pub mod flatten;
pub mod history;
pub mod notify;
pub mod options;
pub mod path;
pub mod store;
pub mod tree;
