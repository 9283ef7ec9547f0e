mod connection;
mod envelope;
mod event;
mod host;
mod markup;
mod message;
mod prompt;
mod settings;
mod surface;
mod tree;

pub use connection::*;
pub use envelope::*;
pub use event::*;
pub use host::*;
pub use markup::*;
pub use message::*;
pub use prompt::*;
pub use settings::*;
pub use surface::*;
pub use tree::*;
