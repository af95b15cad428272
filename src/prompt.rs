pub struct Prompt {
    prefix: String,
}

impl Prompt {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn get_string(&self) -> String {
        format!("{} ", self.prefix)
    }
}
