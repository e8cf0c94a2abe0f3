//! taskline - sequential LLM task pipelines
//!
//! A [`TaskSpec`] is an ordered list of [`Invocation`]s (plain functions,
//! LLM completions, tool-using agents, runtime selections). Running it
//! threads each step's output into the next step, collects an audit record
//! per invocation and returns a [`TaskRecord`].

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod facade;
pub mod invocation;
pub mod message;
pub mod meta;
pub mod output_spec;
pub mod provider;
pub mod record;
pub mod repository;
pub mod task;
pub mod tool;

pub use config::{Connection, ConnectionStore};
pub use context::TaskContext;
pub use error::{FixSuggestion, Result, TasklineError};
pub use executor::{TaskExecutor, TaskRequest, TaskResponse};
pub use facade::{LlmFacade, ProviderFacade};
pub use invocation::{AgentStep, FunctionStep, Invocation, LlmStep, SelectedStep};
pub use message::{InputMessage, LlmConfig, MessageHistory, MessageRole};
pub use meta::{InvocationKind, InvocationMeta, InvocationSpecMeta, TaskMeta};
pub use output_spec::OutputSpec;
pub use record::{InvocationEffect, InvocationRecord, InvocationRecords, TaskArgument, TaskRecord};
pub use repository::StateRepository;
pub use task::TaskSpec;
pub use tool::LlmTool;
