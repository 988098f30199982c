mod deferred;
mod errors;
mod schema;
mod stream;
mod template;
pub mod options;
pub mod settings;

pub use deferred::{
    Deferred, Dependency, boolean, extract, extract_from, generate, list, lists, object,
    pending_generations, text,
};
pub use errors::{GenError, GenErrorKind};
pub use options::{GenerateOptions, OutputKind};
pub use schema::synthesize_schema;
pub use settings::{Settings, configure};
pub use stream::GenerationStream;
pub use template::{Template, TemplatePart};
