use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The slice of an outfit embedded in plan rows
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutfitSummary {
    pub id: Uuid,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A row of the `plans` table, optionally with its outfit embedded
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub plan_date: NaiveDate,
    #[serde(default)]
    pub outfit_id: Option<Uuid>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub outfit: Option<OutfitSummary>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body of the plans upsert. Absent values are sent as `null` so that
/// rescheduling a date overwrites the previous outfit and notes.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PlanUpsert {
    pub owner_id: Uuid,
    pub plan_date: NaiveDate,
    pub outfit_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plan_row_with_embedded_outfit() {
        let plan: Plan = serde_json::from_value(json!({
            "id": "5b2d6f3e-0c55-4f0e-9a1d-3f2b8c7d6e5a",
            "owner_id": "8d0fd2b3-9ca6-4a3b-9d8a-5a1b2c3d4e5f",
            "plan_date": "2024-06-03",
            "outfit_id": "0f8e3f1c-8a6b-4c38-9a8e-2d9a4f1b7c11",
            "notes": null,
            "outfit": { "id": "0f8e3f1c-8a6b-4c38-9a8e-2d9a4f1b7c11", "name": "Office", "notes": null }
        }))
        .unwrap();

        assert_eq!(plan.plan_date, NaiveDate::from_ymd_opt(2024, 6, 3).unwrap());
        assert_eq!(
            plan.outfit.and_then(|o| o.name).as_deref(),
            Some("Office")
        );
    }

    #[test]
    fn upsert_sends_nulls() {
        let body = PlanUpsert {
            owner_id: Uuid::nil(),
            plan_date: NaiveDate::from_ymd_opt(2024, 6, 3).unwrap(),
            outfit_id: None,
            notes: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "owner_id": "00000000-0000-0000-0000-000000000000",
                "plan_date": "2024-06-03",
                "outfit_id": null,
                "notes": null
            })
        );
    }
}
