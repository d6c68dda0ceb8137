//! Tool descriptors, parameter schemas and call arguments.

pub mod arguments;
pub mod descriptor;
pub mod types;

pub use arguments::ToolArguments;
pub use descriptor::{HttpMethod, InvocationSpec, ToolDescriptor};
pub use types::{convert_parameters, ParameterBuilder, ParameterSchema, RawParameter, ToolParameter};
