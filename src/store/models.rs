//! 课程语料的数据模型

use serde::{Deserialize, Serialize};

/// 课程；title 作为唯一标识
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub title: String,
    #[serde(default)]
    pub course_link: Option<String>,
    #[serde(default)]
    pub instructor: Option<String>,
    #[serde(default)]
    pub lessons: Vec<Lesson>,
}

impl Course {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            course_link: None,
            instructor: None,
            lessons: Vec::new(),
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.course_link = Some(link.into());
        self
    }

    pub fn with_instructor(mut self, instructor: impl Into<String>) -> Self {
        self.instructor = Some(instructor.into());
        self
    }

    pub fn with_lesson(mut self, lesson: Lesson) -> Self {
        self.lessons.push(lesson);
        self
    }

    pub fn lesson(&self, lesson_number: u32) -> Option<&Lesson> {
        self.lessons.iter().find(|l| l.lesson_number == lesson_number)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Lesson {
    pub lesson_number: u32,
    pub title: String,
    #[serde(default)]
    pub lesson_link: Option<String>,
}

impl Lesson {
    pub fn new(lesson_number: u32, title: impl Into<String>) -> Self {
        Self {
            lesson_number,
            title: title.into(),
            lesson_link: None,
        }
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.lesson_link = Some(link.into());
        self
    }
}

/// 已分块的课程文本
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CourseChunk {
    pub content: String,
    pub course_title: String,
    #[serde(default)]
    pub lesson_number: Option<u32>,
    #[serde(default)]
    pub chunk_index: usize,
}

impl CourseChunk {
    pub fn new(
        content: impl Into<String>,
        course_title: impl Into<String>,
        lesson_number: Option<u32>,
        chunk_index: usize,
    ) -> Self {
        Self {
            content: content.into(),
            course_title: course_title.into(),
            lesson_number,
            chunk_index,
        }
    }
}
