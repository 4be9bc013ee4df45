//! Execution of external collaborators
//!
//! Local processes through [`invoker::ToolInvoker`], container-hosted slicers through
//! [`container::ContainerSliceAdapter`]. All invocations block until the tool exits.

pub mod container;
pub mod invoker;
