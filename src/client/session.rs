use super::{ChatMessage, ChatReply, ChatRequest, ClientError, Product, DEFAULT_MODEL};

const ROUTINE_SYSTEM_PROMPT: &str = "You are a skincare and makeup expert. Build a simple \
routine from the products the user selected, giving the steps as a list. Suggest extra steps \
and matching products only where the selection leaves a gap, and keep a warm, upbeat tone.";

const FOLLOWUP_SYSTEM_PROMPT: &str = "You are a friendly makeup artist assistant answering \
follow-up questions about skincare and makeup routines and the user's selected products.";

const ROUTINE_TEMPERATURE: f64 = 0.7;
const FOLLOWUP_TEMPERATURE: f64 = 0.8;
const REPLY_MAX_TOKENS: u32 = 350;

/// Products the user has picked, in selection order, unique by `(name, brand)`.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    items: Vec<Product>,
}

impl SelectionState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Select `product` if absent, deselect it if present. Returns whether it is now selected.
    pub fn toggle(&mut self, product: &Product) -> bool {
        if let Some(index) = self.position(product) {
            self.items.remove(index);
            false
        } else {
            self.items.push(product.clone());
            true
        }
    }

    #[must_use]
    pub fn is_selected(&self, product: &Product) -> bool {
        self.position(product).is_some()
    }

    fn position(&self, product: &Product) -> Option<usize> {
        self.items
            .iter()
            .position(|item| item.name == product.name && item.brand == product.brand)
    }

    #[must_use]
    pub fn items(&self) -> &[Product] {
        &self.items
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Labels joined with `", "`.
    #[must_use]
    pub fn summary(&self) -> String {
        self.items
            .iter()
            .map(Product::label)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Conversation state owned by the page: the selection and the last generated routine.
#[derive(Debug, Clone)]
pub struct RoutineSession {
    pub selection: SelectionState,
    model: String,
    last_routine: Option<String>,
}

impl Default for RoutineSession {
    fn default() -> Self {
        Self::new(DEFAULT_MODEL)
    }
}

impl RoutineSession {
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            selection: SelectionState::new(),
            model: model.into(),
            last_routine: None,
        }
    }

    #[must_use]
    pub fn last_routine(&self) -> Option<&str> {
        self.last_routine.as_deref()
    }

    /// Request asking for a routine built from the current selection.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NoProductsSelected`] when the selection is empty.
    pub fn routine_request(&self) -> Result<ChatRequest, ClientError> {
        if self.selection.is_empty() {
            return Err(ClientError::NoProductsSelected);
        }
        let user = format!(
            "Here are the products I have: {}. Please create a step-by-step routine using only these products.",
            self.selection.summary()
        );
        Ok(self.request(ROUTINE_SYSTEM_PROMPT, user, ROUTINE_TEMPERATURE))
    }

    /// Request for a free-form follow-up question, with the last routine and
    /// selection as context.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::EmptyInput`] when `input` is blank.
    pub fn followup_request(&self, input: &str) -> Result<ChatRequest, ClientError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ClientError::EmptyInput);
        }

        let mut user = String::new();
        if let Some(routine) = &self.last_routine {
            user.push_str("Here is the routine you suggested earlier: ");
            user.push_str(routine);
            user.push('\n');
        }
        if !self.selection.is_empty() {
            user.push_str("The user has selected these products: ");
            user.push_str(&self.selection.summary());
            user.push_str(".\n");
        }
        user.push_str(input);

        Ok(self.request(FOLLOWUP_SYSTEM_PROMPT, user, FOLLOWUP_TEMPERATURE))
    }

    /// Extract the reply text; routine replies also become the follow-up context.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::EmptyReply`] when the reply has no message content.
    pub fn record_reply(
        &mut self,
        reply: &ChatReply,
        is_routine: bool,
    ) -> Result<String, ClientError> {
        let content = reply
            .first_content()
            .ok_or(ClientError::EmptyReply)?
            .to_string();
        if is_routine {
            self.last_routine = Some(content.clone());
        }
        Ok(content)
    }

    fn request(&self, system: &str, user: String, temperature: f64) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature: Some(temperature),
            max_tokens: Some(REPLY_MAX_TOKENS),
        }
    }
}
