use chrono::NaiveDate;
use uuid::Uuid;
use wardrobe_postgrest::SortOrder;

use super::PLANS;
use crate::error::{db_error, Error, Result};
use crate::models::{Plan, PlanUpsert};
use crate::session::AuthContext;
use crate::Wardrobe;

const WITH_OUTFIT: &str = "*,outfit:outfits(id,name,notes)";
const OWNER_DATE_KEY: &str = "owner_id,plan_date";

/// The `plans` table: at most one plan per owner and date
pub struct PlanStore<'a> {
    wardrobe: &'a Wardrobe,
}

impl<'a> PlanStore<'a> {
    pub(crate) fn new(wardrobe: &'a Wardrobe) -> Self {
        Self { wardrobe }
    }

    /// Plans dated `start..=end`, earliest first, with their outfit embedded
    pub async fn list_range(
        &self,
        ctx: &AuthContext,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Plan>> {
        self.wardrobe
            .from(PLANS, ctx)?
            .select(WITH_OUTFIT)
            .eq("owner_id", &ctx.owner_id.to_string())
            .gte("plan_date", &start.to_string())
            .lte("plan_date", &end.to_string())
            .order("plan_date", SortOrder::Ascending)
            .execute::<Plan>()
            .await
            .map_err(db_error("failed to list plans"))
    }

    pub async fn get_by_date(&self, ctx: &AuthContext, date: NaiveDate) -> Result<Option<Plan>> {
        self.wardrobe
            .from(PLANS, ctx)?
            .select(WITH_OUTFIT)
            .eq("owner_id", &ctx.owner_id.to_string())
            .eq("plan_date", &date.to_string())
            .execute_single::<Plan>()
            .await
            .map_err(db_error("failed to load plan"))
    }

    /// Schedule `date`, overwriting whatever was planned for it
    pub async fn upsert(
        &self,
        ctx: &AuthContext,
        date: NaiveDate,
        outfit_id: Option<Uuid>,
        notes: Option<String>,
    ) -> Result<Plan> {
        let body = PlanUpsert {
            owner_id: ctx.owner_id,
            plan_date: date,
            outfit_id,
            notes,
        };

        let rows = self
            .wardrobe
            .from(PLANS, ctx)?
            .select(WITH_OUTFIT)
            .upsert_returning::<_, Plan>(&body, OWNER_DATE_KEY)
            .await
            .map_err(db_error("failed to save plan"))?;

        let plan = rows
            .into_iter()
            .next()
            .ok_or_else(|| Error::validation("failed to save plan: no row returned"))?;
        tracing::info!(%date, outfit_id = ?plan.outfit_id, "plan saved");
        Ok(plan)
    }

    pub async fn delete_by_date(&self, ctx: &AuthContext, date: NaiveDate) -> Result<()> {
        self.wardrobe
            .from(PLANS, ctx)?
            .eq("owner_id", &ctx.owner_id.to_string())
            .eq("plan_date", &date.to_string())
            .delete()
            .await
            .map_err(db_error("failed to delete plan"))?;

        tracing::info!(%date, "plan cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ctx, wardrobe, OWNER};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    const PLAN: &str = "9c8b7a6d-5e4f-4a3b-8c2d-1e0f9a8b7c6d";

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[tokio::test]
    async fn range_uses_inclusive_bounds_and_embeds_outfit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/plans"))
            .and(query_param("select", WITH_OUTFIT))
            .and(query_param("order", "plan_date.asc"))
            .respond_with(|req: &Request| {
                let bounds: Vec<String> = req
                    .url
                    .query_pairs()
                    .filter(|(k, _)| k == "plan_date")
                    .map(|(_, v)| v.to_string())
                    .collect();
                if bounds == ["gte.2024-06-03", "lte.2024-06-09"] {
                    ResponseTemplate::new(200).set_body_json(json!([{
                        "id": PLAN,
                        "owner_id": OWNER,
                        "plan_date": "2024-06-04",
                        "outfit_id": null,
                        "notes": "rest day",
                        "outfit": null
                    }]))
                } else {
                    ResponseTemplate::new(400)
                }
            })
            .mount(&server)
            .await;

        let plans = wardrobe(&server)
            .plans()
            .list_range(&ctx(), date(3), date(9))
            .await
            .unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].plan_date, date(4));
        assert!(plans[0].outfit.is_none());
    }

    // A tiny stand-in for the unique (owner_id, plan_date) constraint
    #[tokio::test]
    async fn scheduling_a_date_twice_keeps_one_plan() {
        let server = MockServer::start().await;
        let table: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));

        let writes = table.clone();
        Mock::given(method("POST"))
            .and(path("/rest/v1/plans"))
            .and(query_param("on_conflict", OWNER_DATE_KEY))
            .respond_with(move |req: &Request| {
                let mut row: Value = serde_json::from_slice(&req.body).unwrap();
                row["id"] = json!(PLAN);
                let mut rows = writes.lock().unwrap();
                rows.retain(|r| {
                    r["owner_id"] != row["owner_id"] || r["plan_date"] != row["plan_date"]
                });
                rows.push(row.clone());
                ResponseTemplate::new(201).set_body_json(json!([row]))
            })
            .mount(&server)
            .await;

        let reads = table.clone();
        Mock::given(method("GET"))
            .and(path("/rest/v1/plans"))
            .respond_with(move |_: &Request| {
                ResponseTemplate::new(200).set_body_json(Value::Array(reads.lock().unwrap().clone()))
            })
            .mount(&server)
            .await;

        let wardrobe = wardrobe(&server);
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        wardrobe
            .plans()
            .upsert(&ctx(), date(5), Some(first), None)
            .await
            .unwrap();
        let saved = wardrobe
            .plans()
            .upsert(&ctx(), date(5), Some(second), Some("meeting".to_string()))
            .await
            .unwrap();
        assert_eq!(saved.outfit_id, Some(second));

        let plans = wardrobe
            .plans()
            .list_range(&ctx(), date(1), date(30))
            .await
            .unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].outfit_id, Some(second));
        assert_eq!(plans[0].notes.as_deref(), Some("meeting"));
    }

    #[tokio::test]
    async fn saved_plan_carries_its_outfit() {
        let server = MockServer::start().await;
        let outfit = Uuid::new_v4();
        Mock::given(method("POST"))
            .and(path("/rest/v1/plans"))
            .and(query_param("on_conflict", OWNER_DATE_KEY))
            .respond_with(move |req: &Request| {
                let mut row: Value = serde_json::from_slice(&req.body).unwrap();
                row["id"] = json!(PLAN);
                // Embedded resources only come back when they are selected
                let embeds = req
                    .url
                    .query_pairs()
                    .any(|(k, v)| k == "select" && v == WITH_OUTFIT);
                if embeds {
                    row["outfit"] = json!({ "id": row["outfit_id"], "name": "Office", "notes": null });
                }
                ResponseTemplate::new(201).set_body_json(json!([row]))
            })
            .expect(1)
            .mount(&server)
            .await;

        let plan = wardrobe(&server)
            .plans()
            .upsert(&ctx(), date(6), Some(outfit), None)
            .await
            .unwrap();
        assert_eq!(plan.outfit_id, Some(outfit));
        let summary = plan.outfit.unwrap();
        assert_eq!(summary.id, outfit);
        assert_eq!(summary.name.as_deref(), Some("Office"));
    }

    #[tokio::test]
    async fn missing_date_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/plans"))
            .and(query_param("plan_date", "eq.2024-06-07"))
            .respond_with(ResponseTemplate::new(406).set_body_json(json!({
                "code": "PGRST116",
                "message": "JSON object requested, multiple (or no) rows returned",
                "details": null,
                "hint": null
            })))
            .mount(&server)
            .await;

        let plan = wardrobe(&server)
            .plans()
            .get_by_date(&ctx(), date(7))
            .await
            .unwrap();
        assert!(plan.is_none());
    }

    #[tokio::test]
    async fn delete_targets_owner_and_date() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/rest/v1/plans"))
            .and(query_param("owner_id", format!("eq.{}", OWNER).as_str()))
            .and(query_param("plan_date", "eq.2024-06-07"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        wardrobe(&server)
            .plans()
            .delete_by_date(&ctx(), date(7))
            .await
            .unwrap();
    }
}
