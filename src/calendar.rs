//! Week planner

use chrono::{Datelike, Duration, NaiveDate};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Outfit, Plan};
use crate::session::AuthContext;
use crate::Wardrobe;

/// Monday of the week containing `date`. Sunday belongs to the week that
/// started six days earlier.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// The seven days, Monday to Sunday, of the week containing `date`
pub fn week_of(date: NaiveDate) -> [NaiveDate; 7] {
    let start = week_start(date);
    std::array::from_fn(|offset| start + Duration::days(offset as i64))
}

/// One week of plans together with the outfits that can be scheduled
#[derive(Debug, Clone, PartialEq)]
pub struct WeekPlan {
    pub start: NaiveDate,
    pub plans: Vec<Plan>,
    pub outfits: Vec<Outfit>,
}

impl WeekPlan {
    /// Fetch the week's plans and the owner's outfits concurrently
    pub async fn load(wardrobe: &Wardrobe, ctx: &AuthContext, date: NaiveDate) -> Result<Self> {
        let start = week_start(date);
        let end = start + Duration::days(6);

        let plans = wardrobe.plans();
        let outfits = wardrobe.outfits();
        let (plans, outfits) =
            tokio::try_join!(plans.list_range(ctx, start, end), outfits.list(ctx))?;

        tracing::debug!(%start, plans = plans.len(), outfits = outfits.len(), "week loaded");
        Ok(Self {
            start,
            plans,
            outfits,
        })
    }

    pub fn days(&self) -> [NaiveDate; 7] {
        week_of(self.start)
    }

    pub fn end(&self) -> NaiveDate {
        self.start + Duration::days(6)
    }

    pub fn plan_for(&self, date: NaiveDate) -> Option<&Plan> {
        self.plans.iter().find(|plan| plan.plan_date == date)
    }

    pub fn outfit(&self, id: Uuid) -> Option<&Outfit> {
        self.outfits.iter().find(|outfit| outfit.id == id)
    }

    /// Name shown for a day: the embedded outfit name, falling back to the
    /// outfit list
    pub fn outfit_name_for(&self, date: NaiveDate) -> Option<&str> {
        let plan = self.plan_for(date)?;
        if let Some(name) = plan.outfit.as_ref().and_then(|o| o.name.as_deref()) {
            return Some(name);
        }
        let outfit = self.outfit(plan.outfit_id?)?;
        Some(outfit.display_name())
    }

    pub fn previous_week(&self) -> NaiveDate {
        self.start - Duration::days(7)
    }

    pub fn next_week(&self) -> NaiveDate {
        self.start + Duration::days(7)
    }
}
