// Chat session state and request assembly for the external chat client
use serde::{Deserialize, Serialize};

use crate::config::ChatConfig;
use crate::pdf_extraction::ExtractionResult;

pub const GREETING: &str =
    "Hi! I'm your assistant. How can I help you today? Try uploading a text or PDF file!";
pub const CLEARED: &str = "Chat cleared. How can I assist you now?";
pub const NEW_CHAT: &str = "Hi! I'm your assistant. Let's start a new chat!";

pub const PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ChatRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Assistant, content)
    }
}

/// Streaming chat request body handed to the language-model service
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub stream: bool,
    pub messages: Vec<ChatMessage>,
}

/// Conversation history plus the text of the last uploaded file.
#[derive(Debug, Clone)]
pub struct ChatSession {
    messages: Vec<ChatMessage>,
    file_content: String,
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            messages: vec![ChatMessage::assistant(GREETING)],
            file_content: String::new(),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn file_content(&self) -> &str {
        &self.file_content
    }

    /// Store the outcome of an upload. Failures leave the session with no file content.
    pub fn set_extraction(&mut self, result: &ExtractionResult) {
        self.file_content = match result {
            Ok(extracted) => extracted.text.clone(),
            Err(_) => String::new(),
        };
    }

    pub fn set_file_content(&mut self, content: impl Into<String>) {
        self.file_content = content.into();
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    /// Reset the conversation but keep the uploaded file
    pub fn clear(&mut self) {
        self.messages = vec![ChatMessage::assistant(CLEARED)];
    }

    /// Reset the conversation and forget the uploaded file
    pub fn new_chat(&mut self) {
        self.messages = vec![ChatMessage::assistant(NEW_CHAT)];
        self.file_content.clear();
    }

    /// System prompt, then history, then the file context when there is any.
    pub fn request_messages(&self, system_prompt: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::with_capacity(self.messages.len() + 2);
        messages.push(ChatMessage::system(system_prompt));
        messages.extend(self.messages.iter().cloned());
        if let Some(context) = context_prompt(&self.file_content) {
            messages.push(ChatMessage::system(context));
        }
        messages
    }

    pub fn request(&self, config: &ChatConfig) -> ChatRequest {
        ChatRequest {
            model: config.model.clone(),
            stream: true,
            messages: self.request_messages(&config.system_prompt),
        }
    }

    /// First `PREVIEW_CHARS` characters of the file content for display
    pub fn content_preview(&self) -> Option<String> {
        if self.file_content.is_empty() {
            return None;
        }
        let head: String = self.file_content.chars().take(PREVIEW_CHARS).collect();
        Some(format!("{head}..."))
    }
}

/// Context message that carries the extracted text verbatim
pub fn context_prompt(file_content: &str) -> Option<String> {
    if file_content.is_empty() {
        return None;
    }
    Some(format!(
        "The user has uploaded a file. Here is the relevant content you can refer to:\n\n{file_content}\n\n"
    ))
}

/// One-line status for an upload
pub fn upload_status(result: &ExtractionResult) -> String {
    match result {
        Ok(extracted) => format!(
            "Content extracted successfully! ({} characters)",
            extracted.char_count()
        ),
        Err(failure) => format!("File uploaded, but no content could be extracted. {}", failure.user_guidance()),
    }
}
