use crate::skill::Request;

pub const NEXT_BUS_INTENT: &str = "NextBusIntent";
pub const SAVE_STOP_INTENT: &str = "SaveStopIntent";
pub const DELETE_STOP_INTENT: &str = "DeleteStopIntent";
pub const GET_STOP_INTENT: &str = "GetStopIntent";
pub const HELP_INTENT: &str = "AMAZON.HelpIntent";
pub const CANCEL_INTENT: &str = "AMAZON.CancelIntent";
pub const STOP_INTENT: &str = "AMAZON.StopIntent";

/// Which handler answers a request. Variants are listed in the order their
/// rules are tried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route {
    Launch,
    NextBus,
    SaveStop,
    DeleteStop,
    GetStop,
    Help,
    CancelOrStop,
    SessionEnded,
    Unhandled,
}

pub fn route(request: &Request) -> Route {
    match request {
        Request::LaunchRequest {} => Route::Launch,
        Request::IntentRequest { intent, .. } => match intent.name.as_str() {
            NEXT_BUS_INTENT => Route::NextBus,
            SAVE_STOP_INTENT => Route::SaveStop,
            DELETE_STOP_INTENT => Route::DeleteStop,
            GET_STOP_INTENT => Route::GetStop,
            HELP_INTENT => Route::Help,
            CANCEL_INTENT | STOP_INTENT => Route::CancelOrStop,
            _ => Route::Unhandled,
        },
        Request::SessionEndedRequest { .. } => Route::SessionEnded,
        Request::Unknown => Route::Unhandled,
    }
}
