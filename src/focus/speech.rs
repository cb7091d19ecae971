/// Live announcement region of the main window.
///
/// Screen readers pick up appended messages; the region is emptied once it
/// grows past its cap so it never accumulates unbounded history.
#[derive(Debug, Clone)]
pub struct SpeechBox {
    messages: Vec<String>,
    cap: usize,
}

impl SpeechBox {
    pub fn new(cap: usize) -> Self {
        Self {
            messages: Vec::new(),
            cap,
        }
    }

    pub fn announce(&mut self, message: impl Into<String>) {
        if self.messages.len() > self.cap {
            self.messages.clear();
        }
        let message = message.into();
        log::debug!("Announcing: {}", message);
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    pub fn last(&self) -> Option<&str> {
        self.messages.last().map(String::as_str)
    }
}
