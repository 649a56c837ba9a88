use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::{debug, error, info};

use crate::{
    departures::{
        client::{BoardQuery, DepartureSource},
        format::board_speech,
    },
    skill::{
        ConfirmationStatus, DialogState, Directive, Intent, Request, RequestEnvelope, Response,
        ResponseEnvelope,
        router::{Route, route},
    },
    slots::{FROM_STOP, resolve_slots},
    stops::{
        DEFAULT_STOP, EffectiveQuery,
        store::{AttributeStore, delete_favourite_stop, favourite_stop, save_favourite_stop},
    },
};

const CARD_TITLE: &str = "Next bus";
const WELCOME: &str =
    "Welcome! You can ask when the next bus leaves, or tell me to save your favourite stop.";
const HELP: &str = "You can ask when the next bus leaves, from a stop, to a destination or for a line number. \
                    You can also save, check or delete your favourite stop.";
const GOODBYE: &str = "Goodbye!";
const NOT_UNDERSTOOD: &str = "Sorry, I can't understand the command. Please say again.";

#[derive(Clone, Debug)]
pub struct Settings {
    pub tz: Tz,
    pub default_stop: String,
    pub duration: Option<u32>,
    pub max_journeys: Option<u32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tz: chrono_tz::Europe::Luxembourg,
            default_stop: DEFAULT_STOP.to_string(),
            duration: None,
            max_journeys: None,
        }
    }
}

/// The handler set: one departure board, one attribute store.
pub struct Skill<S, B> {
    store: S,
    board: B,
    settings: Settings,
}

fn intent_parts(request: &Request) -> Result<(&Intent, DialogState)> {
    match request {
        Request::IntentRequest {
            intent,
            dialog_state,
        } => Ok((intent, dialog_state.unwrap_or_default())),
        _ => anyhow::bail!("not an intent request"),
    }
}

impl<S, B> Skill<S, B>
where
    S: AttributeStore,
    B: DepartureSource,
    anyhow::Error: From<S::Error> + From<B::Error>,
{
    pub fn new(store: S, board: B, settings: Settings) -> Self {
        Self {
            store,
            board,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Answers one request. Any failure inside a handler is logged and turned
    /// into the generic apology.
    pub async fn handle(&self, envelope: &RequestEnvelope, now: DateTime<Utc>) -> ResponseEnvelope {
        let route = route(&envelope.request);
        let user_id = envelope.user_id();
        debug!(?route, user_id, "dispatching request");

        let result = match route {
            Route::Launch => Ok(Response::new()
                .speak(WELCOME)
                .reprompt(WELCOME)
                .simple_card(CARD_TITLE, WELCOME)),
            Route::NextBus => self.next_bus(&envelope.request, user_id, now).await,
            Route::SaveStop => self.save_stop(&envelope.request, user_id),
            Route::DeleteStop => self.delete_stop(user_id),
            Route::GetStop => self.get_stop(user_id),
            Route::Help => Ok(Response::new()
                .speak(HELP)
                .reprompt(HELP)
                .simple_card(CARD_TITLE, HELP)),
            Route::CancelOrStop => Ok(Response::new()
                .speak(GOODBYE)
                .simple_card(CARD_TITLE, GOODBYE)
                .end_session()),
            Route::SessionEnded => {
                if let Request::SessionEndedRequest { reason } = &envelope.request {
                    info!("session ended with reason: {}", reason.as_deref().unwrap_or("none"));
                }
                Ok(Response::new())
            }
            Route::Unhandled => {
                debug!("no handler for request {:?}", envelope.request);
                Ok(not_understood())
            }
        };

        match result {
            Ok(response) => response.into(),
            Err(e) => {
                error!("error handled: {e:#}");
                not_understood().into()
            }
        }
    }

    async fn next_bus(
        &self,
        request: &Request,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Response> {
        let (intent, _) = intent_parts(request)?;
        let slots = resolve_slots(&intent.slots);
        let favourite = favourite_stop(&self.store, user_id)?;

        let query = EffectiveQuery::from_slots(
            &slots,
            favourite.as_deref(),
            &self.settings.default_stop,
        );
        info!(
            from = %query.from_stop,
            to = ?query.to_stop,
            line = ?query.line_filter,
            "looking up next departure"
        );

        let board_query = BoardQuery::new(&query)
            .with_limits(self.settings.duration, self.settings.max_journeys);
        let board = self.board.departures(&board_query).await?;

        let spoken = board_speech(&board, &query, self.settings.tz, &now)
            .context("formatting departure")?;

        let mut response = Response::new().speak(&spoken.speech).end_session();
        if let Some(card) = spoken.card {
            response = response.simple_card(&card.title, &card.content);
        }
        Ok(response)
    }

    fn save_stop(&self, request: &Request, user_id: &str) -> Result<Response> {
        let (intent, dialog_state) = intent_parts(request)?;

        if intent.confirmation_status == ConfirmationStatus::Denied {
            return Ok(Response::new()
                .speak("Okay, I won't save that stop.")
                .end_session());
        }

        let slots = resolve_slots(&intent.slots);
        let Some(stop) = slots.get(FROM_STOP) else {
            if dialog_state != DialogState::Completed {
                return Ok(Response::new().directive(Directive::Delegate {
                    updated_intent: None,
                }));
            }
            let speech = "I didn't catch which stop to save. Please say again.";
            return Ok(Response::new().speak(speech).reprompt(speech));
        };

        let to_save = if stop.is_validated {
            &stop.resolved
        } else if intent.confirmation_status == ConfirmationStatus::Confirmed {
            &stop.synonym
        } else {
            debug!("asking to confirm unrecognised stop {:?}", stop.synonym);
            let speech = format!(
                "I don't know a stop called {}. Should I save it as your favourite anyway?",
                stop.synonym
            );
            return Ok(Response::new()
                .speak(&speech)
                .directive(Directive::ConfirmIntent {
                    updated_intent: Some(intent.clone()),
                }));
        };

        save_favourite_stop(&self.store, user_id, to_save)?;
        info!(user_id, stop = %to_save, "saved favourite stop");

        let speech = format!("I've saved {to_save} as your favourite stop.");
        Ok(Response::new()
            .speak(&speech)
            .simple_card(CARD_TITLE, &speech)
            .end_session())
    }

    fn delete_stop(&self, user_id: &str) -> Result<Response> {
        let had_favourite = favourite_stop(&self.store, user_id)?.is_some();
        delete_favourite_stop(&self.store, user_id)?;

        let speech = if had_favourite {
            info!(user_id, "deleted favourite stop");
            "I've forgotten your favourite stop.".to_string()
        } else {
            "You don't have a favourite stop saved.".to_string()
        };

        Ok(Response::new()
            .speak(&speech)
            .simple_card(CARD_TITLE, &speech)
            .end_session())
    }

    fn get_stop(&self, user_id: &str) -> Result<Response> {
        let speech = match favourite_stop(&self.store, user_id)? {
            Some(stop) => format!("Your favourite stop is {stop}."),
            None => format!(
                "You haven't saved a favourite stop yet, so I'll use {}.",
                self.settings.default_stop
            ),
        };

        Ok(Response::new()
            .speak(&speech)
            .simple_card(CARD_TITLE, &speech)
            .end_session())
    }
}

fn not_understood() -> Response {
    Response::new().speak(NOT_UNDERSTOOD).reprompt(NOT_UNDERSTOOD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{future::Future, sync::Mutex};

    use chrono::TimeZone;

    use crate::{
        departures::{DepartureBoard, DepartureRecord},
        skill::{
            Intent,
            router::{
                CANCEL_INTENT, DELETE_STOP_INTENT, GET_STOP_INTENT, HELP_INTENT, NEXT_BUS_INTENT,
                SAVE_STOP_INTENT,
            },
        },
        slots::{LINE_NUMBER, RawSlot, TO_STOP},
        stops::store::MemoryStore,
    };

    const MATCH: &str = "ER_SUCCESS_MATCH";
    const NO_MATCH: &str = "ER_SUCCESS_NO_MATCH";

    /// Serves a fixed board, or fails when there is none, and remembers what
    /// it was asked.
    #[derive(Default)]
    struct FixedBoard {
        board: Option<DepartureBoard>,
        asked: Mutex<Vec<BoardQuery>>,
    }

    impl FixedBoard {
        fn with(records: Option<Vec<DepartureRecord>>) -> Self {
            Self {
                board: Some(DepartureBoard {
                    departures: records,
                }),
                asked: Mutex::default(),
            }
        }

        fn last_query(&self) -> BoardQuery {
            self.asked.lock().unwrap().last().cloned().unwrap()
        }
    }

    impl DepartureSource for FixedBoard {
        type Error = anyhow::Error;

        fn departures(
            &self,
            query: &BoardQuery,
        ) -> impl Future<Output = Result<DepartureBoard, anyhow::Error>> + Send {
            self.asked.lock().unwrap().push(query.clone());
            std::future::ready(self.board.clone().context("board unavailable"))
        }
    }

    fn now() -> DateTime<Utc> {
        chrono_tz::Europe::Luxembourg
            .with_ymd_and_hms(2026, 10, 17, 9, 50, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn delayed_16() -> DepartureRecord {
        DepartureRecord::new("Bus 16", "Kirchberg", "Bonnevoie", "2026-10-17", "10:00:00")
            .with_realtime("2026-10-17", "10:05:00")
    }

    fn skill(board: FixedBoard) -> Skill<MemoryStore, FixedBoard> {
        Skill::new(MemoryStore::new(), board, Settings::default())
    }

    fn intent_request(intent: Intent, dialog_state: Option<DialogState>) -> RequestEnvelope {
        RequestEnvelope::new(Request::IntentRequest {
            intent,
            dialog_state,
        })
        .for_user("user-1")
    }

    async fn say(skill: &Skill<MemoryStore, FixedBoard>, intent: Intent) -> Response {
        skill.handle(&intent_request(intent, None), now()).await.response
    }

    #[tokio::test]
    async fn launch_welcomes() {
        let skill = skill(FixedBoard::default());
        let envelope = RequestEnvelope::new(Request::LaunchRequest {});
        let response = skill.handle(&envelope, now()).await.response;

        assert_eq!(response.speech_text(), Some(WELCOME));
        assert!(response.reprompt.is_some());
        assert_eq!(response.should_end_session, Some(false));
    }

    #[tokio::test]
    async fn next_bus_from_default_stop() {
        let skill = skill(FixedBoard::with(Some(vec![delayed_16()])));
        let response = say(&skill, Intent::new(NEXT_BUS_INTENT)).await;

        assert_eq!(
            response.speech_text(),
            Some("The Bus 16 to Kirchberg is leaving in 15 minutes from Bonnevoie.")
        );
        assert_eq!(response.card.unwrap().title, "10:05 (+5)");
        assert_eq!(response.should_end_session, Some(true));
        assert_eq!(skill.board.last_query().from_stop, DEFAULT_STOP);
        assert_eq!(skill.board.last_query().to_stop, None);
    }

    #[tokio::test]
    async fn next_bus_uses_favourite_then_explicit_stop() {
        let skill = skill(FixedBoard::with(Some(vec![delayed_16()])));
        save_favourite_stop(&skill.store, "user-1", "Bonnevoie").unwrap();

        say(&skill, Intent::new(NEXT_BUS_INTENT)).await;
        assert_eq!(skill.board.last_query().from_stop, "Bonnevoie");

        let explicit = Intent::new(NEXT_BUS_INTENT).with_slot(
            RawSlot::new(FROM_STOP, "the station").with_resolution(MATCH, &["Gare Centrale"]),
        );
        say(&skill, explicit).await;
        assert_eq!(skill.board.last_query().from_stop, "Gare Centrale");

        let unknown = Intent::new(NEXT_BUS_INTENT)
            .with_slot(RawSlot::new(FROM_STOP, "mordor").with_resolution(NO_MATCH, &[]));
        say(&skill, unknown).await;
        assert_eq!(skill.board.last_query().from_stop, "Bonnevoie");
    }

    #[tokio::test]
    async fn next_bus_apologises_with_constraints() {
        let skill = skill(FixedBoard::with(None));
        let intent = Intent::new(NEXT_BUS_INTENT)
            .with_slot(
                RawSlot::new(TO_STOP, "kirchberg").with_resolution(MATCH, &["Luxembourg, Kirchberg"]),
            )
            .with_slot(RawSlot::new(LINE_NUMBER, "16"));
        let response = say(&skill, intent).await;

        assert_eq!(
            response.speech_text(),
            Some(
                "Sorry, I couldn't find any departures of line 16 to Luxembourg, Kirchberg from Luxembourg, Gare Centrale."
            )
        );
        assert_eq!(response.card, None);
        assert_eq!(
            skill.board.last_query().to_stop.as_deref(),
            Some("Luxembourg, Kirchberg")
        );
    }

    #[tokio::test]
    async fn next_bus_warns_about_unknown_destination() {
        let skill = skill(FixedBoard::with(Some(vec![delayed_16()])));
        let intent = Intent::new(NEXT_BUS_INTENT)
            .with_slot(RawSlot::new(TO_STOP, "atlantis").with_resolution(NO_MATCH, &[]));
        let response = say(&skill, intent).await;

        let speech = response.speech_text().unwrap();
        assert!(speech.starts_with("I didn't recognise the destination atlantis"));
        assert_eq!(skill.board.last_query().to_stop, None);
    }

    #[tokio::test]
    async fn upstream_failure_gives_apology() {
        let skill = skill(FixedBoard::default());
        let response = say(&skill, Intent::new(NEXT_BUS_INTENT)).await;

        assert_eq!(response.speech_text(), Some(NOT_UNDERSTOOD));
        assert!(response.reprompt.is_some());
    }

    #[tokio::test]
    async fn save_validated_stop() {
        let skill = skill(FixedBoard::default());
        let intent = Intent::new(SAVE_STOP_INTENT)
            .with_slot(RawSlot::new(FROM_STOP, "bonnevoie").with_resolution(MATCH, &["Bonnevoie"]));

        let response = say(&skill, intent.clone()).await;
        say(&skill, intent).await;

        assert_eq!(
            response.speech_text(),
            Some("I've saved Bonnevoie as your favourite stop.")
        );
        assert_eq!(
            favourite_stop(&skill.store, "user-1").unwrap().as_deref(),
            Some("Bonnevoie")
        );
    }

    #[tokio::test]
    async fn save_unvalidated_stop_needs_confirmation() {
        let skill = skill(FixedBoard::default());
        let mut intent = Intent::new(SAVE_STOP_INTENT)
            .with_slot(RawSlot::new(FROM_STOP, "my corner").with_resolution(NO_MATCH, &[]));

        let response = say(&skill, intent.clone()).await;
        assert!(matches!(
            response.directives.as_slice(),
            [Directive::ConfirmIntent { updated_intent: Some(_) }]
        ));
        assert_eq!(favourite_stop(&skill.store, "user-1").unwrap(), None);

        intent.confirmation_status = ConfirmationStatus::Denied;
        say(&skill, intent.clone()).await;
        assert_eq!(favourite_stop(&skill.store, "user-1").unwrap(), None);

        intent.confirmation_status = ConfirmationStatus::Confirmed;
        say(&skill, intent).await;
        assert_eq!(
            favourite_stop(&skill.store, "user-1").unwrap().as_deref(),
            Some("my corner")
        );
    }

    #[tokio::test]
    async fn save_without_stop_delegates_dialog() {
        let skill = skill(FixedBoard::default());

        let started = skill
            .handle(
                &intent_request(Intent::new(SAVE_STOP_INTENT), Some(DialogState::Started)),
                now(),
            )
            .await
            .response;
        assert_eq!(
            started.directives,
            vec![Directive::Delegate {
                updated_intent: None
            }]
        );

        let completed = skill
            .handle(
                &intent_request(Intent::new(SAVE_STOP_INTENT), Some(DialogState::Completed)),
                now(),
            )
            .await
            .response;
        assert!(completed.directives.is_empty());
        assert!(completed.reprompt.is_some());
    }

    #[tokio::test]
    async fn delete_and_get_stop() {
        let skill = skill(FixedBoard::default());

        let response = say(&skill, Intent::new(DELETE_STOP_INTENT)).await;
        assert_eq!(
            response.speech_text(),
            Some("You don't have a favourite stop saved.")
        );

        save_favourite_stop(&skill.store, "user-1", "Hamilius").unwrap();
        let response = say(&skill, Intent::new(GET_STOP_INTENT)).await;
        assert_eq!(response.speech_text(), Some("Your favourite stop is Hamilius."));

        let response = say(&skill, Intent::new(DELETE_STOP_INTENT)).await;
        assert_eq!(
            response.speech_text(),
            Some("I've forgotten your favourite stop.")
        );

        let response = say(&skill, Intent::new(GET_STOP_INTENT)).await;
        assert_eq!(
            response.speech_text(),
            Some("You haven't saved a favourite stop yet, so I'll use Luxembourg, Gare Centrale.")
        );
    }

    #[tokio::test]
    async fn help_cancel_and_session_end() {
        let skill = skill(FixedBoard::default());

        let help = say(&skill, Intent::new(HELP_INTENT)).await;
        assert_eq!(help.speech_text(), Some(HELP));
        assert_eq!(help.should_end_session, Some(false));

        let cancel = say(&skill, Intent::new(CANCEL_INTENT)).await;
        assert_eq!(cancel.speech_text(), Some(GOODBYE));
        assert_eq!(cancel.should_end_session, Some(true));

        let ended = RequestEnvelope::new(Request::SessionEndedRequest {
            reason: Some("USER_INITIATED".to_string()),
        });
        assert_eq!(skill.handle(&ended, now()).await.response, Response::new());
    }

    #[tokio::test]
    async fn unknown_intent_is_not_understood() {
        let skill = skill(FixedBoard::default());
        let response = say(&skill, Intent::new("AMAZON.FallbackIntent")).await;

        assert_eq!(response.speech_text(), Some(NOT_UNDERSTOOD));
    }
}
