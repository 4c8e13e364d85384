/// What a header or footer hook knows about the page being decorated.
#[derive(Debug, Clone, PartialEq)]
pub struct DocContext {
    /// 1-based number of the page in the output document.
    pub page_number: usize,
    pub title: Option<String>,
}

impl DocContext {
    pub fn new(page_number: usize, title: Option<String>) -> Self {
        Self { page_number, title }
    }
}
