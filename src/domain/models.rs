use chrono::{DateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};

pub const TITLE_MAX_CHARS: usize = 32;
pub const DESCRIPTION_MAX_CHARS: usize = 128;

/// Background color palette carried over from the shipped app; the first
/// entry is the default for new tasks.
pub const DEFAULT_COLORS: [u32; 12] = [
    0xFF20_2124,
    0xFF5B_2B2A,
    0xFF60_4A1D,
    0xFF63_5C1F,
    0xFF35_5823,
    0xFF19_504B,
    0xFF2F_555D,
    0xFF1F_3B5E,
    0xFF42_295D,
    0xFF5A_2345,
    0xFF44_2F1B,
    0xFF3C_3F43,
];

/// Immutable hour/minute pair. Stored as "HH:MM" text in the reminders table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Result<Self, String> {
        if hour > 23 || minute > 59 {
            return Err(format!("invalid time of day {hour:02}:{minute:02}"));
        }
        Ok(Self { hour, minute })
    }

    pub fn parse(value: &str) -> Result<Self, String> {
        let mut split = value.trim().split(':');
        let (Some(hour_str), Some(minute_str), None) = (split.next(), split.next(), split.next())
        else {
            return Err(format!("time must be HH:MM, got '{value}'"));
        };
        let hour = hour_str
            .parse::<u8>()
            .map_err(|_| format!("time must be HH:MM, got '{value}'"))?;
        let minute = minute_str
            .parse::<u8>()
            .map_err(|_| format!("time must be HH:MM, got '{value}'"))?;
        Self::new(hour, minute)
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }

    pub fn as_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(u32::from(self.hour), u32::from(self.minute), 0)
            .expect("hour and minute are range-checked on construction")
    }

    /// 12-hour clock rendering, e.g. "09:30 pm".
    pub fn format_12_hour(&self) -> String {
        let (hour, suffix) = match self.hour {
            0 => (12, "am"),
            1..=11 => (self.hour, "am"),
            12 => (12, "pm"),
            _ => (self.hour - 12, "pm"),
        };
        format!("{hour:02}:{:02} {suffix}", self.minute)
    }
}

impl std::fmt::Display for TimeOfDay {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Ordered set of weekdays a task repeats on, packed into a 7-bit mask.
/// Bit 0 is Sunday through bit 6 Saturday, matching the column order of the
/// tasks table.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RepeatDays(u8);

/// Sunday-first column order of the seven weekday flags.
pub const WEEKDAY_COLUMN_ORDER: [Weekday; 7] = [
    Weekday::Sun,
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
];

impl RepeatDays {
    pub const NONE: RepeatDays = RepeatDays(0);
    pub const EVERY_DAY: RepeatDays = RepeatDays(0b111_1111);

    fn bit(day: Weekday) -> u8 {
        1 << day.num_days_from_sunday()
    }

    pub fn from_flags(flags: [bool; 7]) -> Self {
        let mut mask = 0u8;
        for (index, set) in flags.iter().enumerate() {
            if *set {
                mask |= 1 << index;
            }
        }
        Self(mask)
    }

    /// Flags in Sunday..Saturday column order.
    pub fn flags(&self) -> [bool; 7] {
        let mut flags = [false; 7];
        for (index, flag) in flags.iter_mut().enumerate() {
            *flag = self.0 & (1 << index) != 0;
        }
        flags
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & Self::bit(day) != 0
    }

    pub fn with(self, day: Weekday) -> Self {
        Self(self.0 | Self::bit(day))
    }

    pub fn without(self, day: Weekday) -> Self {
        Self(self.0 & !Self::bit(day))
    }

    pub fn count(&self) -> u32 {
        self.0.count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn days(&self) -> impl Iterator<Item = Weekday> + '_ {
        WEEKDAY_COLUMN_ORDER
            .into_iter()
            .filter(|day| self.contains(*day))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Completed,
    Incomplete,
    /// Relations were not loaded, so today's completion state is not known.
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reminder {
    pub id: i64,
    pub task_id: i64,
    pub start_time: TimeOfDay,
    pub duration_minutes: u32,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub color: u32,
    pub repeat_days: RepeatDays,
    pub reminder: Option<Reminder>,
    pub status: TaskStatus,
}

impl Task {
    /// A task is recurring iff at least one weekday flag is set.
    pub fn is_recurring(&self) -> bool {
        !self.repeat_days.is_empty()
    }

    pub fn repeat_count(&self) -> u32 {
        self.repeat_days.count()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderDraft {
    pub start_time: TimeOfDay,
    pub duration_minutes: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub repeat_days: RepeatDays,
    pub reminder: Option<ReminderDraft>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            color: DEFAULT_COLORS[0],
            repeat_days: RepeatDays::NONE,
            reminder: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        validate_title(&self.title)?;
        validate_description(&self.description)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReminderChange {
    #[default]
    Keep,
    Set(ReminderDraft),
    Remove,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: Option<u32>,
    pub repeat_days: Option<RepeatDays>,
    #[serde(default)]
    pub reminder: ReminderChange,
}

impl TaskPatch {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(title) = &self.title {
            validate_title(title)?;
        }
        if let Some(description) = &self.description {
            validate_description(description)?;
        }
        Ok(())
    }
}

fn validate_title(title: &str) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("title must not be empty".to_string());
    }
    if title.chars().count() > TITLE_MAX_CHARS {
        return Err(format!("title must be at most {TITLE_MAX_CHARS} characters"));
    }
    Ok(())
}

fn validate_description(description: &str) -> Result<(), String> {
    if description.chars().count() > DESCRIPTION_MAX_CHARS {
        return Err(format!(
            "description must be at most {DESCRIPTION_MAX_CHARS} characters"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn time_of_day_rejects_out_of_range() {
        assert!(TimeOfDay::new(24, 0).is_err());
        assert!(TimeOfDay::new(0, 60).is_err());
        assert!(TimeOfDay::new(23, 59).is_ok());
    }

    #[test]
    fn time_of_day_parse_and_display_roundtrip() {
        let time = TimeOfDay::parse("09:05").expect("valid time");
        assert_eq!(time.hour(), 9);
        assert_eq!(time.minute(), 5);
        assert_eq!(time.to_string(), "09:05");
        assert!(TimeOfDay::parse("9").is_err());
        assert!(TimeOfDay::parse("09:05:00").is_err());
        assert!(TimeOfDay::parse("25:00").is_err());
    }

    #[test]
    fn time_of_day_12_hour_rendering() {
        assert_eq!(TimeOfDay::new(0, 15).unwrap().format_12_hour(), "12:15 am");
        assert_eq!(TimeOfDay::new(9, 0).unwrap().format_12_hour(), "09:00 am");
        assert_eq!(TimeOfDay::new(12, 30).unwrap().format_12_hour(), "12:30 pm");
        assert_eq!(TimeOfDay::new(21, 45).unwrap().format_12_hour(), "09:45 pm");
    }

    #[test]
    fn repeat_days_mask_operations() {
        let days = RepeatDays::NONE
            .with(Weekday::Mon)
            .with(Weekday::Wed)
            .with(Weekday::Fri);
        assert_eq!(days.count(), 3);
        assert!(days.contains(Weekday::Wed));
        assert!(!days.contains(Weekday::Sun));
        assert!(!days.is_empty());
        assert!(days.without(Weekday::Mon).without(Weekday::Wed).without(Weekday::Fri).is_empty());
        assert_eq!(
            days.days().collect::<Vec<_>>(),
            vec![Weekday::Mon, Weekday::Wed, Weekday::Fri]
        );
    }

    #[test]
    fn repeat_days_flags_follow_column_order() {
        let days = RepeatDays::NONE.with(Weekday::Sun).with(Weekday::Sat);
        assert_eq!(days.flags(), [true, false, false, false, false, false, true]);
        assert_eq!(RepeatDays::EVERY_DAY.flags(), [true; 7]);
    }

    #[test]
    fn task_draft_validation() {
        let mut draft = TaskDraft::new("Morning run");
        assert!(draft.validate().is_ok());

        draft.title = "   ".to_string();
        assert!(draft.validate().is_err());

        draft.title = "x".repeat(TITLE_MAX_CHARS + 1);
        assert!(draft.validate().is_err());

        draft.title = "Morning run".to_string();
        draft.description = "y".repeat(DESCRIPTION_MAX_CHARS + 1);
        assert!(draft.validate().is_err());
    }

    #[test]
    fn task_patch_validation_checks_present_fields_only() {
        let patch = TaskPatch::default();
        assert!(patch.validate().is_ok());

        let patch = TaskPatch {
            title: Some(String::new()),
            ..TaskPatch::default()
        };
        assert!(patch.validate().is_err());
    }

    proptest! {
        #[test]
        fn repeat_days_flags_roundtrip(flags in proptest::array::uniform7(any::<bool>())) {
            let days = RepeatDays::from_flags(flags);
            prop_assert_eq!(days.flags(), flags);
            prop_assert_eq!(days.count() as usize, flags.iter().filter(|set| **set).count());
            prop_assert_eq!(days.is_empty(), flags.iter().all(|set| !set));
        }

        #[test]
        fn repeat_days_contains_matches_column_order(flags in proptest::array::uniform7(any::<bool>())) {
            let days = RepeatDays::from_flags(flags);
            for (index, day) in WEEKDAY_COLUMN_ORDER.iter().enumerate() {
                prop_assert_eq!(days.contains(*day), flags[index]);
            }
        }
    }
}
