use tokio::task::JoinHandle;

use crate::config::Config;
use crate::gemini::{build_contents, ChatError, Content, GeminiClient};
use crate::history::{ChatMessage, ChatRole, HistoryStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Conversation state
    pub messages: Vec<ChatMessage>,
    pub sending: bool,
    pub reply_task: Option<JoinHandle<Result<String, ChatError>>>,
    pub reply_error: Option<String>,

    // Composer state
    pub input: String,
    pub cursor: usize, // cursor position in input, in chars

    // Transcript scroll state
    pub chat_scroll: u16,
    pub chat_height: u16, // inner height of the chat area, set during render
    pub chat_width: u16,  // inner width of the chat area, for wrap calculations

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // API key prompt state
    pub show_key_input: bool,
    pub key_input: String,
    pub key_cursor: usize,

    // Remote call configuration
    pub client: Option<GeminiClient>,
    pub model: String,
    pub system_prompt: Option<String>,

    store: HistoryStore,
}

impl App {
    pub fn new(config: Config, store: HistoryStore) -> Self {
        // Env var wins over the config file; the key never lives in source.
        let api_key = std::env::var("GEMINI_API_KEY").ok()
            .or_else(|| config.api_key.clone());
        let client = api_key.as_deref().map(GeminiClient::new);

        let messages = store.load();

        let mut app = Self {
            should_quit: false,
            input_mode: InputMode::Editing,

            messages,
            sending: false,
            reply_task: None,
            reply_error: None,

            input: String::new(),
            cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_width: 0,

            animation_frame: 0,

            show_key_input: false,
            key_input: String::new(),
            key_cursor: 0,

            client,
            model: config.model(),
            system_prompt: config.system_prompt,

            store,
        };
        app.scroll_to_bottom();
        app
    }

    /// Whether a new submission is currently permitted.
    pub fn can_send(&self) -> bool {
        self.client.is_some() && !self.sending
    }

    /// Start a submission: validate, record the user message, and hand back
    /// the wire payload for the caller to dispatch. Returns `None` when the
    /// submission is a no-op (blank text, a send already in flight) or when
    /// no key is configured, in which case the key prompt opens instead.
    pub fn begin_send(&mut self, text: &str) -> Option<Vec<Content>> {
        let text = text.trim();
        if text.is_empty() || self.sending {
            return None;
        }
        if self.client.is_none() {
            self.show_key_input = true;
            return None;
        }

        self.reply_error = None;
        self.messages.push(ChatMessage {
            role: ChatRole::User,
            content: text.to_string(),
        });
        self.sending = true;
        self.scroll_to_bottom();

        Some(build_contents(self.system_prompt.as_deref(), &self.messages))
    }

    /// Reap the in-flight request once it has resolved. Called from the event
    /// loop; does nothing while the task is still running.
    pub async fn poll_reply(&mut self) {
        let done = self.reply_task.as_ref().map(|task| task.is_finished()).unwrap_or(false);
        if !done {
            return;
        }
        let Some(task) = self.reply_task.take() else { return };

        match task.await {
            Ok(result) => self.finish_reply(result),
            Err(_) => {
                self.sending = false;
                self.reply_error = Some("The request failed unexpectedly.".to_string());
                self.scroll_to_bottom();
            }
        }
    }

    /// Resolve the pending reply slot: append and persist the assistant
    /// message on success, or render the classified message on failure.
    /// Error text never enters the history.
    pub fn finish_reply(&mut self, result: Result<String, ChatError>) {
        self.sending = false;

        match result {
            Ok(text) => {
                self.messages.push(ChatMessage {
                    role: ChatRole::Assistant,
                    content: text,
                });
                let _ = self.store.save(&self.messages);
            }
            Err(err) => {
                self.reply_error = Some(err.to_string());
            }
        }

        self.scroll_to_bottom();
    }

    /// Store the API key entered in the prompt and unblock sending.
    pub fn set_api_key(&mut self, key: &str) {
        self.client = Some(GeminiClient::new(key));
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.sending {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_sub(1);
    }

    pub fn scroll_down(&mut self) {
        self.chat_scroll = self.chat_scroll.saturating_add(1);
    }

    /// Pin the transcript to the bottom so the newest entry (or the pending
    /// placeholder) is visible.
    pub fn scroll_to_bottom(&mut self) {
        // Use actual chat width for wrap calculation, default to 50 if not set
        let wrap_width = if self.chat_width > 0 {
            self.chat_width as usize
        } else {
            50
        };

        let mut total_lines: u16 = 0;

        for msg in &self.messages {
            total_lines += 1; // label line
            for line in msg.content.lines() {
                // Character count, not byte length, for proper UTF-8 handling
                let char_count = line.chars().count();
                if char_count == 0 {
                    total_lines += 1;
                } else {
                    total_lines += ((char_count / wrap_width) + 1) as u16;
                }
            }
            total_lines += 1; // blank line after message
        }

        if self.sending {
            total_lines += 2; // label + "Processing..."
        } else if let Some(err) = &self.reply_error {
            total_lines += 1 + ((err.chars().count() / wrap_width) + 1) as u16;
        }

        let visible_height = if self.chat_height > 0 {
            self.chat_height
        } else {
            20
        };

        self.chat_scroll = total_lines.saturating_sub(visible_height);
    }
}
