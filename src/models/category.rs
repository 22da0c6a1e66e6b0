use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 题目类别
///
/// 对应 C1 考试的各个部分。名称即存储中使用的 `type` 字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// 多项选择完形填空
    ReadingAndUseOfLanguage1,
    /// 开放式完形填空
    ReadingAndUseOfLanguage2,
    /// 构词
    ReadingAndUseOfLanguage3,
    /// 关键词句型转换
    ReadingAndUseOfLanguage4,
    /// 长篇阅读选择
    ReadingAndUseOfLanguage5,
    /// 跨文本匹配
    ReadingAndUseOfLanguage6,
    /// 段落填空
    ReadingAndUseOfLanguage7,
    /// 多项匹配
    ReadingAndUseOfLanguage8,
    Listening1,
    Listening2,
    Listening3,
    Listening4,
    /// 议论文
    Writing1,
    /// 提案 / 报告 / 评论
    Writing2,
    Speaking1,
    /// 看图长回合（含图片）
    Speaking2,
    Speaking3,
}

/// 类别所属的题型家族
///
/// 同一家族的题目共享同一种 payload 结构。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryFamily {
    Reading,
    Listening,
    Writing,
    Speaking,
}

/// 类别解析失败
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("未知的题目类别: {0}")]
pub struct ParseCategoryError(pub String);

static CATEGORY_BY_NAME: phf::Map<&'static str, Category> = phf::phf_map! {
    "reading_and_use_of_language1" => Category::ReadingAndUseOfLanguage1,
    "reading_and_use_of_language2" => Category::ReadingAndUseOfLanguage2,
    "reading_and_use_of_language3" => Category::ReadingAndUseOfLanguage3,
    "reading_and_use_of_language4" => Category::ReadingAndUseOfLanguage4,
    "reading_and_use_of_language5" => Category::ReadingAndUseOfLanguage5,
    "reading_and_use_of_language6" => Category::ReadingAndUseOfLanguage6,
    "reading_and_use_of_language7" => Category::ReadingAndUseOfLanguage7,
    "reading_and_use_of_language8" => Category::ReadingAndUseOfLanguage8,
    // 旧版生成器使用的简称
    "part1" => Category::ReadingAndUseOfLanguage1,
    "part2" => Category::ReadingAndUseOfLanguage2,
    "part3" => Category::ReadingAndUseOfLanguage3,
    "part4" => Category::ReadingAndUseOfLanguage4,
    "part5" => Category::ReadingAndUseOfLanguage5,
    "part6" => Category::ReadingAndUseOfLanguage6,
    "part7" => Category::ReadingAndUseOfLanguage7,
    "part8" => Category::ReadingAndUseOfLanguage8,
    "listening1" => Category::Listening1,
    "listening2" => Category::Listening2,
    "listening3" => Category::Listening3,
    "listening4" => Category::Listening4,
    "writing1" => Category::Writing1,
    "writing2" => Category::Writing2,
    "speaking1" => Category::Speaking1,
    "speaking2" => Category::Speaking2,
    "speaking3" => Category::Speaking3,
};

impl Category {
    /// 全部类别
    pub const ALL: [Category; 17] = [
        Category::ReadingAndUseOfLanguage1,
        Category::ReadingAndUseOfLanguage2,
        Category::ReadingAndUseOfLanguage3,
        Category::ReadingAndUseOfLanguage4,
        Category::ReadingAndUseOfLanguage5,
        Category::ReadingAndUseOfLanguage6,
        Category::ReadingAndUseOfLanguage7,
        Category::ReadingAndUseOfLanguage8,
        Category::Listening1,
        Category::Listening2,
        Category::Listening3,
        Category::Listening4,
        Category::Writing1,
        Category::Writing2,
        Category::Speaking1,
        Category::Speaking2,
        Category::Speaking3,
    ];

    /// 模拟考试的固定结构（顺序即输出顺序）
    pub const EXAM_STRUCTURE: [Category; 8] = [
        Category::ReadingAndUseOfLanguage1,
        Category::ReadingAndUseOfLanguage2,
        Category::ReadingAndUseOfLanguage3,
        Category::ReadingAndUseOfLanguage4,
        Category::ReadingAndUseOfLanguage5,
        Category::ReadingAndUseOfLanguage6,
        Category::ReadingAndUseOfLanguage7,
        Category::ReadingAndUseOfLanguage8,
    ];

    /// 存储中使用的名称
    pub fn name(self) -> &'static str {
        match self {
            Category::ReadingAndUseOfLanguage1 => "reading_and_use_of_language1",
            Category::ReadingAndUseOfLanguage2 => "reading_and_use_of_language2",
            Category::ReadingAndUseOfLanguage3 => "reading_and_use_of_language3",
            Category::ReadingAndUseOfLanguage4 => "reading_and_use_of_language4",
            Category::ReadingAndUseOfLanguage5 => "reading_and_use_of_language5",
            Category::ReadingAndUseOfLanguage6 => "reading_and_use_of_language6",
            Category::ReadingAndUseOfLanguage7 => "reading_and_use_of_language7",
            Category::ReadingAndUseOfLanguage8 => "reading_and_use_of_language8",
            Category::Listening1 => "listening1",
            Category::Listening2 => "listening2",
            Category::Listening3 => "listening3",
            Category::Listening4 => "listening4",
            Category::Writing1 => "writing1",
            Category::Writing2 => "writing2",
            Category::Speaking1 => "speaking1",
            Category::Speaking2 => "speaking2",
            Category::Speaking3 => "speaking3",
        }
    }

    /// 题型家族
    pub fn family(self) -> CategoryFamily {
        match self {
            Category::ReadingAndUseOfLanguage1
            | Category::ReadingAndUseOfLanguage2
            | Category::ReadingAndUseOfLanguage3
            | Category::ReadingAndUseOfLanguage4
            | Category::ReadingAndUseOfLanguage5
            | Category::ReadingAndUseOfLanguage6
            | Category::ReadingAndUseOfLanguage7
            | Category::ReadingAndUseOfLanguage8 => CategoryFamily::Reading,
            Category::Listening1
            | Category::Listening2
            | Category::Listening3
            | Category::Listening4 => CategoryFamily::Listening,
            Category::Writing1 | Category::Writing2 => CategoryFamily::Writing,
            Category::Speaking1 | Category::Speaking2 | Category::Speaking3 => {
                CategoryFamily::Speaking
            }
        }
    }

    /// 是否含图片
    pub fn is_image_bearing(self) -> bool {
        matches!(self, Category::Speaking2)
    }

    /// 生成失败时是否可以返回内置的兜底题目
    ///
    /// 口语题可以兜底，其余类别直接把错误交给调用方。
    pub fn has_degraded_fallback(self) -> bool {
        self.family() == CategoryFamily::Speaking
    }

    /// 尝试从字符串解析类别（支持旧版简称，忽略大小写和首尾空白）
    pub fn parse(s: &str) -> Result<Self, ParseCategoryError> {
        let key = s.trim().to_lowercase();
        CATEGORY_BY_NAME
            .get(key.as_str())
            .copied()
            .ok_or_else(|| ParseCategoryError(s.to_string()))
    }
}

impl std::str::FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::parse(s)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl CategoryFamily {
    pub fn name(self) -> &'static str {
        match self {
            CategoryFamily::Reading => "reading",
            CategoryFamily::Listening => "listening",
            CategoryFamily::Writing => "writing",
            CategoryFamily::Speaking => "speaking",
        }
    }
}

impl std::fmt::Display for CategoryFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_every_name() {
        for category in Category::ALL {
            assert_eq!(Category::parse(category.name()).unwrap(), category);
        }
    }

    #[test]
    fn test_parse_accepts_legacy_aliases() {
        assert_eq!(
            Category::parse("Part3").unwrap(),
            Category::ReadingAndUseOfLanguage3
        );
        assert_eq!(" speaking2 ".parse::<Category>().unwrap(), Category::Speaking2);
        assert!(Category::parse("reading9").is_err());
    }

    #[test]
    fn test_serde_name_matches_store_name() {
        let json = serde_json::to_string(&Category::ReadingAndUseOfLanguage7).unwrap();
        assert_eq!(json, "\"reading_and_use_of_language7\"");
        let back: Category = serde_json::from_str("\"listening4\"").unwrap();
        assert_eq!(back, Category::Listening4);
    }

    #[test]
    fn test_exam_structure_is_reading_only() {
        assert!(Category::EXAM_STRUCTURE
            .iter()
            .all(|c| c.family() == CategoryFamily::Reading));
        assert!(Category::Speaking2.is_image_bearing());
        assert!(Category::Speaking1.has_degraded_fallback());
        assert!(!Category::Writing1.has_degraded_fallback());
    }
}
