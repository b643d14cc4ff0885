//! Deadline pressure and urgency scoring.
//!
//! Both functions are step functions with hard breakpoints at 6h/24h/72h.
//! The discontinuous jumps at the exact boundaries are intentional and
//! preserved; tests assume them. Smoothing is a possible future improvement,
//! not a bug fix.

use chrono::{DateTime, Utc};

use crate::task::Task;

/// Pressure when no deadline is set. Moderate rather than zero so undated
/// work is not starved behind everything with a date.
const NO_DEADLINE_PRESSURE: f64 = 0.3;

/// Urgency score in [0, 1] for a campaign deadline, used when computing base
/// priority at decomposition time. No deadline yields a moderate default.
pub fn deadline_pressure(deadline: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    match deadline {
        Some(deadline) => pressure_from_hours(hours_until(deadline, now)),
        None => NO_DEADLINE_PRESSURE,
    }
}

/// Urgency score in [0, 1] for a task inside worker scoring. Unlike
/// `deadline_pressure`, an undated task contributes nothing here.
pub fn deadline_urgency(task: &Task, now: DateTime<Utc>) -> f64 {
    match task.deadline {
        Some(deadline) => pressure_from_hours(hours_until(deadline, now)),
        None => 0.0,
    }
}

fn hours_until(deadline: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    (deadline - now).num_seconds() as f64 / 3600.0
}

fn pressure_from_hours(hours: f64) -> f64 {
    // An overdue deadline is maximally urgent.
    if hours <= 6.0 {
        1.0
    } else if hours <= 24.0 {
        0.8
    } else if hours <= 72.0 {
        0.6
    } else {
        0.3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{TaskPriority, TaskType};
    use chrono::Duration;
    use uuid::Uuid;

    #[test]
    fn test_pressure_steps() {
        let now = Utc::now();
        let at = |hours: i64| Some(now + Duration::hours(hours));

        assert_eq!(deadline_pressure(at(2), now), 1.0);
        assert_eq!(deadline_pressure(at(12), now), 0.8);
        assert_eq!(deadline_pressure(at(48), now), 0.6);
        assert_eq!(deadline_pressure(at(100), now), 0.3);
        assert_eq!(deadline_pressure(None, now), 0.3);
    }

    #[test]
    fn test_pressure_at_exact_boundaries() {
        let now = Utc::now();
        assert_eq!(deadline_pressure(Some(now + Duration::hours(6)), now), 1.0);
        assert_eq!(deadline_pressure(Some(now + Duration::hours(24)), now), 0.8);
        assert_eq!(deadline_pressure(Some(now + Duration::hours(72)), now), 0.6);
    }

    #[test]
    fn test_overdue_is_maximally_urgent() {
        let now = Utc::now();
        assert_eq!(deadline_pressure(Some(now - Duration::hours(1)), now), 1.0);
    }

    #[test]
    fn test_urgency_defaults_to_zero_without_deadline() {
        let now = Utc::now();
        let undated = Task::new(Uuid::new_v4(), TaskType::Planning, TaskPriority::Normal, now);
        assert_eq!(deadline_urgency(&undated, now), 0.0);

        let dated = undated.clone().with_deadline(Some(now + Duration::hours(3)));
        assert_eq!(deadline_urgency(&dated, now), 1.0);
    }
}
