mod local;

pub use local::{FileStorage, LocalFileStorage};
