//! Inventory golden tests: typed CRUD and the raw JSON helpers over HTTP.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use labtrack_client::{
        Accessory, ApiClient, ApiError, ClientConfig, Computer, InventoryApi, Lab,
        MemoryTokenStore, Part, PartStatus, Report, ReportKind, SessionManager, User,
    };
    use serde_json::{json, Map, Value};

    use crate::backend::{Backend, PASSWORD, USERNAME};

    async fn logged_in(backend: &Backend) -> ApiClient {
        let store = Arc::new(MemoryTokenStore::new());
        let api = ApiClient::new(ClientConfig::single(&backend.base_url), store).unwrap();
        SessionManager::new(api.clone())
            .login(USERNAME, PASSWORD)
            .await
            .unwrap();
        api
    }

    fn lab(name: &str, location: &str) -> Lab {
        Lab {
            id: None,
            name: name.into(),
            location: location.into(),
        }
    }

    fn computer(name: &str, lab: &str) -> Computer {
        Computer {
            id: None,
            name: name.into(),
            lab_name: lab.into(),
            parts: [(Part::Monitor, "MN-1".to_string())].into(),
        }
    }

    fn row(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn assert_not_found(err: ApiError, message: &str) {
        match err {
            ApiError::Server { status, message: got } => {
                assert_eq!(status, 404);
                assert_eq!(got, message);
            }
            other => panic!("expected 404, got {other:?}"),
        }
    }

    // =====================================================================
    // Labs
    // =====================================================================

    #[tokio::test]
    async fn lab_crud() {
        let backend = Backend::start().await.unwrap();
        let labs = InventoryApi::new(logged_in(&backend).await).labs();

        let created = labs.create(&lab("CL-1", "2nd floor")).await.unwrap();
        let id = created.id.expect("server assigns an id").to_string();
        assert_eq!(created.name, "CL-1");

        let fetched = labs.get(&id).await.unwrap();
        assert_eq!(fetched, created);

        let updated = labs.update(&id, &lab("CL-1", "3rd floor")).await.unwrap();
        assert_eq!(updated.location, "3rd floor");
        assert_eq!(updated.id, created.id);

        labs.create(&lab("CL-2", "")).await.unwrap();
        let all = labs.list().await.unwrap();
        assert_eq!(all.len(), 2);

        labs.delete(&id).await.unwrap();
        assert_not_found(labs.get(&id).await.unwrap_err(), "lab not found");
        assert_eq!(labs.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn server_message_is_surfaced() {
        let backend = Backend::start().await.unwrap();
        let labs = InventoryApi::new(logged_in(&backend).await).labs();

        labs.create(&lab("CL-1", "")).await.unwrap();
        let err = labs.create(&lab("CL-1", "")).await.unwrap_err();
        assert_eq!(err.status(), Some(409));
        assert_eq!(err.message(), "lab name already taken");
    }

    // =====================================================================
    // Computers and part statuses
    // =====================================================================

    #[tokio::test]
    async fn computer_crud_and_lab_filter() {
        let backend = Backend::start().await.unwrap();
        let inventory = InventoryApi::new(logged_in(&backend).await);
        let computers = inventory.computers();

        let pc1 = computers.create(&computer("PC-01", "CL-1")).await.unwrap();
        computers.create(&computer("PC-02", "CL-1")).await.unwrap();
        computers.create(&computer("PC-01", "CL-2")).await.unwrap();
        let id = pc1.id.expect("server assigns an id").to_string();
        assert_eq!(pc1.parts.get(&Part::Monitor).map(String::as_str), Some("MN-1"));

        let in_cl1 = inventory.computers_in_lab("CL-1").await.unwrap();
        let names: Vec<&str> = in_cl1.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["PC-01", "PC-02"]);
        assert!(inventory.computers_in_lab("CL-9").await.unwrap().is_empty());

        let moved = computers.update(&id, &computer("PC-01", "CL-2")).await.unwrap();
        assert_eq!(moved.id, pc1.id);
        assert_eq!(inventory.computers_in_lab("CL-2").await.unwrap().len(), 2);

        computers.delete(&id).await.unwrap();
        assert_not_found(computers.get(&id).await.unwrap_err(), "computer not found");
    }

    #[tokio::test]
    async fn marking_parts_updates_statuses() {
        let backend = Backend::start().await.unwrap();
        let inventory = InventoryApi::new(logged_in(&backend).await);
        let pc = inventory.computers().create(&computer("PC-07", "CL-1")).await.unwrap();
        let id = pc.id.unwrap();

        assert!(inventory.part_statuses().await.unwrap().is_empty());

        inventory.set_part_status(id, Part::Mouse, PartStatus::Missing).await.unwrap();
        inventory.set_part_status(id, Part::Monitor, PartStatus::Damaged).await.unwrap();
        inventory.set_part_status(id, Part::Mouse, PartStatus::Operational).await.unwrap();

        let statuses = inventory.part_statuses().await.unwrap();
        assert_eq!(statuses.len(), 1);
        let row = &statuses[0];
        assert_eq!(row.com_id, id);
        assert_eq!(row.get(Part::Mouse), PartStatus::Operational);
        assert_eq!(row.get(Part::Monitor), PartStatus::Damaged);
        assert_eq!(row.overall(), PartStatus::Damaged);

        let err = inventory
            .set_part_status(id + 100, Part::Wifi, PartStatus::Missing)
            .await
            .unwrap_err();
        assert_not_found(err, "computer not found");
    }

    // =====================================================================
    // Accessories, reports, users
    // =====================================================================

    #[tokio::test]
    async fn accessory_crud() {
        let backend = Backend::start().await.unwrap();
        let accessories = InventoryApi::new(logged_in(&backend).await).accessories();

        let projector = Accessory {
            id: None,
            name: "Projector".into(),
            lab_name: "CL-1".into(),
            quantity: 2,
            status: Some(PartStatus::Damaged),
        };
        let created = accessories.create(&projector).await.unwrap();
        let id = created.id.unwrap().to_string();
        assert_eq!(created.status, Some(PartStatus::Damaged));

        let repaired = Accessory { quantity: 3, status: Some(PartStatus::Operational), ..projector };
        let updated = accessories.update(&id, &repaired).await.unwrap();
        assert_eq!(updated.quantity, 3);
        assert_eq!(accessories.get(&id).await.unwrap(), updated);

        accessories.delete(&id).await.unwrap();
        assert!(accessories.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn reports_filter_by_kind_and_tolerate_unknown_statuses() {
        let backend = Backend::start().await.unwrap();
        backend.seed_report(
            ReportKind::Admin,
            row(json!({ "item": "PC-01", "lab": "CL-1", "status": "Damage" })),
        );
        backend.seed_report(
            ReportKind::Admin,
            row(json!({ "item": "Projector", "lab": "CL-1", "status": "Pending" })),
        );
        backend.seed_report(
            ReportKind::Student,
            row(json!({ "item": "PC-04", "lab": "CL-2", "status": "Notoperational" })),
        );
        let inventory = InventoryApi::new(logged_in(&backend).await);

        let admin = inventory.reports_by(ReportKind::Admin).await.unwrap();
        let statuses: Vec<_> = admin.iter().map(|r| r.status).collect();
        assert_eq!(statuses, [Some(PartStatus::Damaged), None]);

        let student = inventory.reports_by(ReportKind::Student).await.unwrap();
        assert_eq!(student.len(), 1);
        assert_eq!(student[0].status, Some(PartStatus::NotOperational));

        assert_eq!(inventory.reports().list().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn report_crud() {
        let backend = Backend::start().await.unwrap();
        let reports = InventoryApi::new(logged_in(&backend).await).reports();

        let filed = Report {
            id: None,
            item: "PC-03".into(),
            lab: "CL-1".into(),
            status: Some(PartStatus::Missing),
            date: Some("2026-10-19".into()),
            submitted_by: Some(USERNAME.into()),
            label: None,
        };
        let created = reports.create(&filed).await.unwrap();
        let id = created.id.unwrap().to_string();

        let found = Report { status: Some(PartStatus::Operational), ..filed };
        let updated = reports.update(&id, &found).await.unwrap();
        assert_eq!(updated.status, Some(PartStatus::Operational));
        assert_eq!(reports.get(&id).await.unwrap().item, "PC-03");

        reports.delete(&id).await.unwrap();
        assert_not_found(reports.get(&id).await.unwrap_err(), "report not found");
    }

    #[tokio::test]
    async fn users_are_addressed_by_email() {
        let backend = Backend::start().await.unwrap();
        let inventory = InventoryApi::new(logged_in(&backend).await);
        let users = inventory.users();
        let email = "lea ramos+lab@school.edu";

        let lea = User {
            id: None,
            name: "Lea Ramos".into(),
            email: email.into(),
            role: "Lab Assistant".into(),
        };
        users.create(&lea).await.unwrap();
        let err = users.create(&lea).await.unwrap_err();
        assert_eq!(err.status(), Some(409));
        assert_eq!(err.message(), "user email already taken");

        assert_eq!(users.get(email).await.unwrap().name, "Lea Ramos");
        let promoted = User { role: "Faculty".into(), ..lea };
        assert_eq!(users.update(email, &promoted).await.unwrap().role, "Faculty");

        inventory.delete_user_by_email(email).await.unwrap();
        assert_not_found(users.get(email).await.unwrap_err(), "user not found");
        assert!(users.list().await.unwrap().is_empty());
    }

    // =====================================================================
    // Raw helpers
    // =====================================================================

    #[tokio::test]
    async fn raw_helpers() {
        let backend = Backend::start().await.unwrap();
        let api = logged_in(&backend).await;

        let created = api
            .post("/labs", json!({ "data": { "name": "CL-9" } }))
            .await
            .unwrap();
        let id = created["data"]["id"].as_i64().unwrap();
        assert_eq!(created["msg"], "lab created");

        let listed = api.get("/labs").await.unwrap();
        assert_eq!(listed["data"][0]["name"], "CL-9");

        let updated = api
            .put(&format!("/labs/{id}"), json!({ "data": { "name": "CL-9", "location": "annex" } }))
            .await
            .unwrap();
        assert_eq!(updated["data"]["location"], "annex");

        // 204 with no body.
        let deleted = api.delete(&format!("/labs/{id}")).await.unwrap();
        assert!(deleted.is_null());
    }

    #[tokio::test]
    async fn bodiless_failure_uses_fallback_message() {
        let backend = Backend::start().await.unwrap();
        let api = logged_in(&backend).await;

        // Rejected by the JSON extractor with a plain-text body.
        let err = api
            .post("/labs", json!({ "data": { "location": "annex" } }))
            .await
            .unwrap_err();
        assert_eq!(err.message(), "API POST: Unknown error");
        assert!(!err.is_unauthorized());
    }
}
