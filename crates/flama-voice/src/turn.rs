use flama_core::Role;

/// Text accumulation buffers for one voice turn. Fragments pile up per
/// speaker until the service signals turn completion, then both buffers
/// flush atomically.
#[derive(Debug, Default)]
pub struct TurnBuffers {
    user: String,
    bot: String,
    last_is_user: bool,
}

impl TurnBuffers {
    /// Append a transcription fragment and return the updated live
    /// "currently speaking" indicator line.
    pub fn push(&mut self, is_user: bool, text: &str) -> String {
        self.last_is_user = is_user;
        if is_user {
            self.user.push_str(text);
        } else {
            self.bot.push_str(text);
        }
        self.live_line()
    }

    /// Indicator for whoever spoke last.
    pub fn live_line(&self) -> String {
        if self.last_is_user {
            format!("🗣️ {}", self.user)
        } else {
            format!("🤖 {}", self.bot)
        }
    }

    pub fn is_empty(&self) -> bool {
        self.user.trim().is_empty() && self.bot.trim().is_empty()
    }

    /// Drain both buffers into at most two (role, text) pairs — user
    /// first — skipping whitespace-only content. Both buffers are clear
    /// afterwards regardless of what was emitted.
    pub fn flush(&mut self) -> Vec<(Role, String)> {
        let user = std::mem::take(&mut self.user);
        let bot = std::mem::take(&mut self.bot);
        self.last_is_user = false;

        let mut turns = Vec::with_capacity(2);
        let user = user.trim();
        if !user.is_empty() {
            turns.push((Role::User, user.to_string()));
        }
        let bot = bot.trim();
        if !bot.is_empty() {
            turns.push((Role::Bot, bot.to_string()));
        }
        turns
    }
}
