use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::slots::RawSlot;

pub mod handlers;
pub mod router;

pub use handlers::{Settings, Skill};

pub const ANONYMOUS_USER: &str = "anonymous";

#[derive(Clone, Debug, Deserialize)]
pub struct User {
    #[serde(rename = "userId")]
    pub user_id: String,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Session {
    pub user: Option<User>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct System {
    pub user: Option<User>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Context {
    #[serde(rename = "System")]
    pub system: Option<System>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DialogState {
    #[default]
    Started,
    InProgress,
    Completed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfirmationStatus {
    #[default]
    None,
    Confirmed,
    Denied,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    pub name: String,
    #[serde(default)]
    pub confirmation_status: ConfirmationStatus,
    #[serde(default)]
    pub slots: HashMap<String, RawSlot>,
}

impl Intent {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            confirmation_status: ConfirmationStatus::None,
            slots: HashMap::new(),
        }
    }

    pub fn with_slot(mut self, slot: RawSlot) -> Self {
        self.slots.insert(slot.name.clone(), slot);
        self
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    LaunchRequest {},
    IntentRequest {
        intent: Intent,
        #[serde(rename = "dialogState")]
        dialog_state: Option<DialogState>,
    },
    SessionEndedRequest {
        reason: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RequestEnvelope {
    pub session: Option<Session>,
    pub context: Option<Context>,
    pub request: Request,
}

impl RequestEnvelope {
    pub fn new(request: Request) -> Self {
        Self {
            session: None,
            context: None,
            request,
        }
    }

    pub fn for_user(mut self, user_id: &str) -> Self {
        self.session = Some(Session {
            user: Some(User {
                user_id: user_id.to_string(),
            }),
        });
        self
    }

    /// The caller's identity, preferring the device context over the session.
    pub fn user_id(&self) -> &str {
        self.context
            .as_ref()
            .and_then(|c| c.system.as_ref())
            .and_then(|s| s.user.as_ref())
            .or_else(|| self.session.as_ref().and_then(|s| s.user.as_ref()))
            .map(|u| u.user_id.as_str())
            .unwrap_or(ANONYMOUS_USER)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutputSpeech {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl OutputSpeech {
    fn plain(text: &str) -> Self {
        Self {
            kind: "PlainText".to_string(),
            text: text.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reprompt {
    pub output_speech: OutputSpeech,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CardPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Directive {
    #[serde(rename = "Dialog.Delegate")]
    Delegate {
        #[serde(rename = "updatedIntent", skip_serializing_if = "Option::is_none")]
        updated_intent: Option<Intent>,
    },
    #[serde(rename = "Dialog.ConfirmIntent")]
    ConfirmIntent {
        #[serde(rename = "updatedIntent", skip_serializing_if = "Option::is_none")]
        updated_intent: Option<Intent>,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_speech: Option<OutputSpeech>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reprompt: Option<Reprompt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<CardPayload>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub directives: Vec<Directive>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub should_end_session: Option<bool>,
}

impl Response {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn speak(mut self, text: &str) -> Self {
        self.output_speech = Some(OutputSpeech::plain(text));
        self
    }

    /// Asks again with `text` and keeps the session open.
    pub fn reprompt(mut self, text: &str) -> Self {
        self.reprompt = Some(Reprompt {
            output_speech: OutputSpeech::plain(text),
        });
        self.should_end_session = Some(false);
        self
    }

    pub fn simple_card(mut self, title: &str, content: &str) -> Self {
        self.card = Some(CardPayload {
            kind: "Simple".to_string(),
            title: title.to_string(),
            content: content.to_string(),
        });
        self
    }

    pub fn directive(mut self, directive: Directive) -> Self {
        self.directives.push(directive);
        self.should_end_session = Some(false);
        self
    }

    pub fn end_session(mut self) -> Self {
        self.should_end_session = Some(true);
        self
    }

    pub fn speech_text(&self) -> Option<&str> {
        self.output_speech.as_ref().map(|s| s.text.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResponseEnvelope {
    pub version: String,
    pub response: Response,
}

impl From<Response> for ResponseEnvelope {
    fn from(response: Response) -> Self {
        Self {
            version: "1.0".to_string(),
            response,
        }
    }
}
