use chrono::Utc;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::models::{AcademicPeriod, UserProfile};
use crate::semester::{Semester, Session};
use crate::store::{CurrentPeriodProvider, PeriodStore};

/// Adds a (semester, session) pair and makes it the only active period.
pub async fn open_period<S: PeriodStore>(
    store: &S,
    semester: Semester,
    session: Session,
) -> CoreResult<AcademicPeriod> {
    if store.find_period(semester, &session).await?.is_some() {
        return Err(CoreError::Validation(format!(
            "{semester} semester of {session} already exists"
        )));
    }

    let period = AcademicPeriod {
        id: Uuid::new_v4(),
        semester,
        session,
        is_active: true,
        created_at: Utc::now(),
    };
    store.activate_period(&period).await?;
    Ok(period)
}

/// `100 + 100 * years since entry`, e.g. 300 for the third year.
pub fn academic_level(entry: Option<&Session>, current: Option<&Session>) -> Option<u32> {
    let years = current?.start_year() - entry?.start_year();
    u32::try_from(years).ok().map(|years| 100 + years * 100)
}

pub async fn current_level<P: CurrentPeriodProvider>(
    provider: &P,
    student: &UserProfile,
) -> CoreResult<Option<u32>> {
    let current = provider.current_period().await?;
    Ok(academic_level(
        student.session.as_ref(),
        current.as_ref().map(|p| &p.session),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    fn session(value: &str) -> Session {
        value.parse().unwrap()
    }

    #[tokio::test]
    async fn opening_a_period_deactivates_the_rest() {
        let store = MemoryStore::new();
        open_period(&store, Semester::First, session("2024/2025")).await.unwrap();
        let second = open_period(&store, Semester::Second, session("2024/2025"))
            .await
            .unwrap();

        let active = store.current_period().await.unwrap().unwrap();
        assert_eq!(active.id, second.id);

        let periods = store.list_periods().await.unwrap();
        assert_eq!(periods.len(), 2);
        assert_eq!(periods.iter().filter(|p| p.is_active).count(), 1);
    }

    #[tokio::test]
    async fn duplicate_period_is_refused() {
        let store = MemoryStore::new();
        open_period(&store, Semester::First, session("2024/2025")).await.unwrap();
        let err = open_period(&store, Semester::First, session("2024/2025"))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn level_counts_years_since_entry() {
        let entry = session("2022/2023");
        assert_eq!(academic_level(Some(&entry), Some(&session("2022/2023"))), Some(100));
        assert_eq!(academic_level(Some(&entry), Some(&session("2024/2025"))), Some(300));
        assert_eq!(academic_level(Some(&entry), Some(&session("2021/2022"))), None);
        assert_eq!(academic_level(None, Some(&entry)), None);
        assert_eq!(academic_level(Some(&entry), None), None);
    }
}
