use super::Selector;

/// Everything the agent assumes about the host's markup. Defaults describe the Cursor
/// composer.
#[derive(Clone, Debug)]
pub struct HostMarkup {
    /// Attribute carrying the per-container ordering key.
    pub key_attribute: String,
    pub container: Selector,
    pub markdown_root: Selector,
    pub section: Selector,
    /// Attribute on a section holding its encoded markdown source.
    pub raw_attribute: String,
    /// Code rendering wrapper that may appear inside a section.
    pub section_code: Selector,
    pub view_lines: Selector,
    pub view_line: Selector,
    pub code_container: Selector,
    pub code_filename: Selector,
    pub editor_pane: Selector,
    /// Code rendering sub-trees that can be inserted after their container.
    pub code_renderer: Selector,
    /// Marks rendered assistant content.
    pub rendered_content: Selector,
    /// Marks an editable surface, present in user bubbles.
    pub editable: Selector,
    pub prompt_input: Selector,
    pub submit_control: Selector,
}

impl Default for HostMarkup {
    fn default() -> HostMarkup {
        let key_attribute = "data-message-index";

        return HostMarkup {
            key_attribute: key_attribute.to_string(),
            container: Selector::attr(key_attribute),
            markdown_root: Selector::class("anysphere-markdown-container-root"),
            section: Selector::class("markdown-section"),
            raw_attribute: "data-markdown-raw".to_string(),
            section_code: Selector::Any(vec![
                Selector::class("markdown-code-outer-container"),
                Selector::class("composer-code-block-container"),
                Selector::class("composer-code-block-content"),
            ]),
            view_lines: Selector::class("view-lines"),
            view_line: Selector::class("view-line"),
            code_container: Selector::class("composer-code-block-container"),
            code_filename: Selector::class("composer-code-block-filename"),
            editor_pane: Selector::class("monaco-editor"),
            code_renderer: Selector::Any(vec![
                Selector::class("monaco-editor"),
                Selector::class("view-lines"),
                Selector::class("view-line"),
            ]),
            rendered_content: Selector::Any(vec![
                Selector::class("anysphere-markdown-container-root"),
                Selector::class("markdown-section"),
            ]),
            editable: Selector::Any(vec![
                Selector::class("aislash-editor-input"),
                Selector::attr_eq("contenteditable", "true"),
            ]),
            prompt_input: Selector::class("aislash-editor-input"),
            submit_control: Selector::All(vec![
                Selector::tag("div"),
                Selector::class("anysphere-icon-button"),
                Selector::attr_eq("data-mode", "agent"),
                Selector::attr_eq("data-outlined", "true"),
            ]),
        };
    }
}
