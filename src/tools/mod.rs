pub mod outline;
pub mod registry;
pub mod schema;
pub mod search;

pub use outline::{CourseOutlineTool, OUTLINE_TOOL_NAME};
pub use registry::{Source, SourceLedger, Tool, ToolDispatcher, ToolRegistry};
pub use schema::{input_schema_for, CourseOutlineArgs, SearchCourseArgs};
pub use search::{CourseSearchTool, SEARCH_TOOL_NAME};
