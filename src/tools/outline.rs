//! 课程大纲工具（get_course_outline）

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::store::{Course, CourseStore};
use crate::tools::schema::{input_schema_for, CourseOutlineArgs};
use crate::tools::Tool;

pub const OUTLINE_TOOL_NAME: &str = "get_course_outline";

/// 大纲工具：解析课程名后输出标题、讲师、链接与按课时号排序的课时列表
pub struct CourseOutlineTool {
    store: Arc<dyn CourseStore>,
}

impl CourseOutlineTool {
    pub fn new(store: Arc<dyn CourseStore>) -> Self {
        Self { store }
    }

    pub async fn outline(&self, course_name: &str) -> String {
        let Some(title) = self.store.resolve_course_name(course_name).await else {
            return format!("No course found matching '{course_name}'");
        };
        match self.store.course_metadata(&title).await {
            Some(course) => format_outline(&course),
            None => format!("Course metadata not found for '{title}'"),
        }
    }
}

fn format_outline(course: &Course) -> String {
    let mut parts = vec![format!("**{}**", course.title)];

    if let Some(instructor) = course.instructor.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("Instructor: {instructor}"));
    }
    if let Some(link) = course.course_link.as_deref().filter(|s| !s.is_empty()) {
        parts.push(format!("Course Link: {link}"));
    }

    if course.lessons.is_empty() {
        parts.push("\nNo lessons found for this course.".to_string());
        return parts.join("\n");
    }

    let mut lessons: Vec<_> = course.lessons.iter().collect();
    lessons.sort_by_key(|l| l.lesson_number);

    parts.push(format!("\nLessons ({} total):", lessons.len()));
    for lesson in lessons {
        let mut line = format!("{}. {}", lesson.lesson_number, lesson.title);
        if let Some(link) = lesson.lesson_link.as_deref().filter(|s| !s.is_empty()) {
            line.push_str(&format!(" - [Video Link]({link})"));
        }
        parts.push(line);
    }
    parts.join("\n")
}

#[async_trait]
impl Tool for CourseOutlineTool {
    fn name(&self) -> &str {
        OUTLINE_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Get the complete outline and lesson list for a course including course title, link, and all lessons"
    }

    fn input_schema(&self) -> Value {
        input_schema_for::<CourseOutlineArgs>()
    }

    async fn execute(&self, input: Value) -> Result<String, String> {
        let args: CourseOutlineArgs =
            serde_json::from_value(input).map_err(|e| format!("Invalid arguments: {e}"))?;
        tracing::info!(course = %args.course_name, "course outline");
        Ok(self.outline(&args.course_name).await)
    }
}
