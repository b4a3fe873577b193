//! Tests for utility functions

use chrono::{TimeZone, Utc};
use prometheus_schedule::util::clock::{Clock, ManualClock};
use prometheus_schedule::util::time::{local_time_of_day, parse_zone, TimeOfDay, Zone};

#[test]
fn test_time_of_day_parsing() {
    let nine: TimeOfDay = "9".parse().unwrap();
    assert_eq!((nine.hour(), nine.minute()), (9, 0));
    assert_eq!(nine.to_string(), "9:00");

    let half: TimeOfDay = "13:30".parse().unwrap();
    assert_eq!(half.minutes(), 13 * 60 + 30);
    assert_eq!(half.to_string(), "13:30");

    assert!("24".parse::<TimeOfDay>().is_err());
    assert!("12:60".parse::<TimeOfDay>().is_err());
    assert!("noon".parse::<TimeOfDay>().is_err());
}

#[test]
fn test_time_of_day_from_integer_or_string() {
    let from_int: TimeOfDay = serde_json::from_str("17").unwrap();
    let from_str: TimeOfDay = serde_json::from_str(r#""17:00""#).unwrap();
    assert_eq!(from_int, from_str);
    assert_eq!(serde_json::to_string(&from_int).unwrap(), r#""17:00""#);
}

#[test]
fn test_parse_zone() {
    assert_eq!(parse_zone("UTC").unwrap(), Zone::Named(chrono_tz::UTC));
    assert_eq!(parse_zone("Europe/Paris").unwrap(), Zone::Named(chrono_tz::Europe::Paris));
    match parse_zone("+02:00").unwrap() {
        Zone::Fixed(offset) => assert_eq!(offset.local_minus_utc(), 7200),
        other => panic!("expected fixed offset, got {other:?}"),
    }
    assert!(parse_zone("Z").is_ok());
    assert!(parse_zone("Mars/Olympus").is_err());
}

#[test]
fn test_local_time_of_day_applies_offset() {
    let now = Utc.with_ymd_and_hms(2024, 1, 1, 23, 15, 0).unwrap();
    assert_eq!(local_time_of_day(now, None).unwrap().to_string(), "23:15");
    assert_eq!(local_time_of_day(now, Some("+01:00")).unwrap().to_string(), "0:15");
}

#[test]
fn test_manual_clock() {
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let clock = ManualClock::new(start);
    assert_eq!(clock.now(), start);
    clock.advance(chrono::Duration::minutes(5));
    assert_eq!(clock.now(), start + chrono::Duration::minutes(5));
    clock.set(start);
    assert_eq!(clock.now(), start);
}
