use std::collections::HashMap;

/// 模板里唯一支持的占位符。
pub const CONTENT_PLACEHOLDER: &str = "{content}";

/// 命名提示词模板；模板名集合就是 `Manager::request` 支持的类型集合。
#[derive(Debug, Clone, Default)]
pub struct PromptBook {
    templates: HashMap<String, String>,
}

impl PromptBook {
    pub fn new(templates: HashMap<String, String>) -> Self {
        Self { templates }
    }

    pub fn insert(&mut self, name: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(name.into(), template.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }

    /// 把 `message` 字面替换进 `{content}`；未知模板名返回 `None`。
    pub fn render(&self, name: &str, message: &str) -> Option<String> {
        self.templates
            .get(name)
            .map(|template| template.replace(CONTENT_PLACEHOLDER, message))
    }
}
