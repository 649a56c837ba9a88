use chrono::{DateTime, TimeDelta, TimeZone};

/// How long until `due`, as it would be said out loud: "now", "in a few
/// seconds", "in 12 minutes", "in an hour", "in 3 days".
///
/// Anything less than a second away, or already past, is "now".
pub fn relative_phrase<A: TimeZone, B: TimeZone>(due: &DateTime<A>, now: &DateTime<B>) -> String {
    let until = due.fixed_offset() - now.fixed_offset();
    if until < TimeDelta::seconds(1) {
        return "now".to_string();
    }

    format!("in {}", humanize(until))
}

fn rounded(value: f64) -> i64 {
    value.round() as i64
}

/// Calendar-relative rendering of a positive duration. Each unit rounds to the
/// nearest whole value before the cut-offs are applied.
pub fn humanize(duration: TimeDelta) -> String {
    let secs = duration.num_milliseconds() as f64 / 1000.0;
    let seconds = rounded(secs);
    let minutes = rounded(secs / 60.0);
    let hours = rounded(secs / 3_600.0);
    let days = rounded(secs / 86_400.0);
    let months = rounded(secs / (86_400.0 * 30.436_875));
    let years = rounded(secs / (86_400.0 * 365.242_5));

    if seconds < 45 {
        "a few seconds".to_string()
    } else if minutes <= 1 {
        "a minute".to_string()
    } else if minutes < 45 {
        format!("{minutes} minutes")
    } else if hours <= 1 {
        "an hour".to_string()
    } else if hours < 22 {
        format!("{hours} hours")
    } else if days <= 1 {
        "a day".to_string()
    } else if days < 26 {
        format!("{days} days")
    } else if months <= 1 {
        "a month".to_string()
    } else if months < 11 {
        format!("{months} months")
    } else if years <= 1 {
        "a year".to_string()
    } else {
        format!("{years} years")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn phrase_after(delta: TimeDelta) -> String {
        let now = Utc::now();
        relative_phrase(&(now + delta), &now)
    }

    #[test]
    fn due_or_past_is_now() {
        assert_eq!(phrase_after(TimeDelta::zero()), "now");
        assert_eq!(phrase_after(TimeDelta::milliseconds(999)), "now");
        assert_eq!(phrase_after(TimeDelta::minutes(-3)), "now");
    }

    #[test]
    fn future_phrases() {
        assert_eq!(phrase_after(TimeDelta::seconds(20)), "in a few seconds");
        assert_eq!(phrase_after(TimeDelta::seconds(50)), "in a minute");
        assert_eq!(phrase_after(TimeDelta::minutes(10)), "in 10 minutes");
        assert_eq!(phrase_after(TimeDelta::minutes(12)), "in 12 minutes");
        assert_eq!(phrase_after(TimeDelta::minutes(44)), "in 44 minutes");
        assert_eq!(phrase_after(TimeDelta::minutes(50)), "in an hour");
        assert_eq!(phrase_after(TimeDelta::minutes(150)), "in 3 hours");
        assert_eq!(phrase_after(TimeDelta::hours(23)), "in a day");
        assert_eq!(phrase_after(TimeDelta::days(3)), "in 3 days");
    }

    #[test]
    fn works_across_time_zones() {
        let tz = chrono_tz::Europe::Luxembourg;
        let due = tz.with_ymd_and_hms(2026, 10, 17, 10, 0, 0).unwrap();
        let now = due.with_timezone(&Utc) - TimeDelta::minutes(10);

        assert_eq!(relative_phrase(&due, &now), "in 10 minutes");
    }
}
