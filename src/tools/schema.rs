//! 工具参数类型与 JSON Schema 生成（schemars）
//!
//! 参数结构体同时用于生成 input_schema 与反序列化 LLM 传入的 input，保证两者一致。

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

/// search_course_content 的参数
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SearchCourseArgs {
    /// What to search for in the course content
    pub query: String,
    /// Course title (partial matches work, e.g. 'MCP', 'Introduction')
    pub course_name: Option<String>,
    /// Specific lesson number to search within (e.g. 1, 2, 3)
    pub lesson_number: Option<i64>,
}

/// get_course_outline 的参数
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CourseOutlineArgs {
    /// Course title (partial matches work, e.g. 'MCP', 'Introduction')
    pub course_name: String,
}

/// 生成 T 的 input_schema：内联子 schema，Option 字段不加 null 类型，去掉 $schema / title
pub fn input_schema_for<T: JsonSchema>() -> Value {
    let settings = SchemaSettings::draft07().with(|s| {
        s.option_nullable = false;
        s.option_add_null_type = false;
        s.inline_subschemas = true;
    });
    let schema = settings.into_generator().into_root_schema_for::<T>();
    let mut value = serde_json::to_value(schema).unwrap_or_else(|_| serde_json::json!({}));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
        obj.remove("description");
        obj.entry("required").or_insert_with(|| Value::Array(Vec::new()));
    }
    value
}
