// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

//! 去重存储集成测试

use permitrs::domain::models::permit::{LicenseKind, PermitRecord};
use permitrs::infrastructure::memory::InMemoryPermitRepository;
use permitrs::store::{UpsertOutcome, UpsertStore};
use std::sync::Arc;

fn record(permit_no: &str, applicant: &str) -> PermitRecord {
    PermitRecord {
        natural_key: PermitRecord::derive_natural_key("新北市", permit_no),
        authority: "新北市".to_string(),
        permit_no: permit_no.to_string(),
        kind: LicenseKind::Construction,
        applicant: Some(applicant.to_string()),
        floor_summary: serde_json::Value::Null,
        extra: serde_json::json!({}),
        ..PermitRecord::default()
    }
}

#[tokio::test]
async fn test_upsert_created_then_unchanged_then_updated() {
    let repo = Arc::new(InMemoryPermitRepository::new());
    let store = UpsertStore::new(repo.clone());
    let key = record("113信建字第1號", "甲").natural_key.clone();

    let outcome = store
        .upsert(&record("113信建字第1號", "甲"), "listing:新北市:2024:建造執照:p1")
        .await
        .unwrap();
    assert_eq!(outcome, UpsertOutcome::Created);

    // 同一记录重放：无写入、无事件
    let outcome = store
        .upsert(&record("113信建字第1號", "甲"), "listing:新北市:2024:建造執照:p1")
        .await
        .unwrap();
    assert_eq!(outcome, UpsertOutcome::Unchanged);
    assert!(store.history(&key).await.unwrap().is_empty());

    // 字段变化：更新并产生携带新旧值的变更事件
    let outcome = store
        .upsert(&record("113信建字第1號", "乙"), "listing:新北市:2024:建造執照:p2")
        .await
        .unwrap();
    match outcome {
        UpsertOutcome::Updated { changed_fields } => {
            assert_eq!(changed_fields, vec!["applicant".to_string()]);
        }
        other => panic!("expected Updated, got {:?}", other),
    }

    let history = store.history(&key).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].field, "applicant");
    assert_eq!(history[0].old_value, serde_json::json!("甲"));
    assert_eq!(history[0].new_value, serde_json::json!("乙"));
    assert_eq!(history[0].work_unit_key, "listing:新北市:2024:建造執照:p2");

    let stored = store.find_by_key(&key).await.unwrap().unwrap();
    assert_eq!(stored.applicant.as_deref(), Some("乙"));
}

#[tokio::test]
async fn test_concurrent_same_key_upserts_serialize() {
    let repo = Arc::new(InMemoryPermitRepository::new());
    let store = Arc::new(UpsertStore::new(repo.clone()));

    let mut tasks = Vec::new();
    for worker in 0..8 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let applicant = format!("申請人{}", worker);
            store
                .upsert(&record("113信建字第7號", &applicant), "unit")
                .await
        }));
    }

    let mut created = 0;
    for task in tasks {
        let outcome = task.await.unwrap().unwrap();
        if outcome == UpsertOutcome::Created {
            created += 1;
        }
    }

    // 恰好一个工作器走插入路径，其余串行走更新或未变更
    assert_eq!(created, 1);
    assert_eq!(repo.len(), 1);

    let key = record("113信建字第7號", "x").natural_key.clone();
    let stored = store.find_by_key(&key).await.unwrap().unwrap();
    let history = store.history(&key).await.unwrap();
    // 终值与事件链一致：最后一个事件的新值即存储值
    if let Some(last) = history.last() {
        assert_eq!(
            last.new_value,
            serde_json::to_value(&stored.applicant).unwrap()
        );
    }
}

#[tokio::test]
async fn test_distinct_keys_do_not_interfere() {
    let repo = Arc::new(InMemoryPermitRepository::new());
    let store = Arc::new(UpsertStore::new(repo.clone()));

    let mut tasks = Vec::new();
    for n in 0..20 {
        let store = store.clone();
        tasks.push(tokio::spawn(async move {
            let permit_no = format!("113信建字第{}號", n);
            store.upsert(&record(&permit_no, "甲"), "unit").await
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), UpsertOutcome::Created);
    }
    assert_eq!(repo.len(), 20);
}
