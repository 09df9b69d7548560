//! Integration tests exercising end-to-end facade behavior.

use std::thread::sleep;
use std::time::Duration;

use chrono::Utc;
use noema_graph::entity::{EntityPatch, MemoryType};
use noema_graph::error::GraphError;
use noema_graph::facade::GraphEngine;
use noema_graph::graph::{Direction, EdgeFilter};
use noema_graph::memory::{BudgetAllocation, ContextOptions, ExclusionReason, SalienceContext, SalienceWeights};
use noema_graph::search::SearchFilter;

fn engine() -> GraphEngine {
    GraphEngine::open_sqlite_in_memory().expect("in-memory store")
}

#[test]
fn cascade_delete_removes_touching_relations() {
    let engine = engine();
    engine.create_entity("Alice", "person", &[]).unwrap();
    engine.create_entity("Bob", "person", &[]).unwrap();
    engine.create_entity("Charlie", "person", &[]).unwrap();
    engine.create_relation("Alice", "Bob", "knows").unwrap();
    engine.create_relation("Bob", "Charlie", "knows").unwrap();

    engine.delete_entity("Bob").unwrap();

    assert!(engine.get_entity("Alice").unwrap().is_some());
    assert!(engine.get_entity("Charlie").unwrap().is_some());
    assert!(engine.get_entity("Bob").unwrap().is_none());

    let filter = EdgeFilter::default();
    assert!(engine.neighbors("Alice", Direction::Both, &filter).unwrap().is_empty());
    assert!(engine.neighbors("Charlie", Direction::Both, &filter).unwrap().is_empty());
}

#[test]
fn ranked_search_orders_by_term_overlap() {
    let engine = engine();
    engine.create_entity("E1", "note", &["machine learning".to_string()]).unwrap();
    engine.create_entity("E2", "note", &["machine".to_string()]).unwrap();
    engine.create_entity("E3", "note", &["learning".to_string()]).unwrap();

    let filter = SearchFilter::default();
    let results = engine.search_ranked("machine learning", &filter).unwrap();
    let rank: Vec<&str> = results.iter().map(|m| m.name.as_str()).collect();

    assert_eq!(rank[0], "E1");
    let score_e1 = results.iter().find(|m| m.name == "E1").unwrap().score;
    let score_e2 = results.iter().find(|m| m.name == "E2").unwrap().score;
    let score_e3 = results.iter().find(|m| m.name == "E3").unwrap().score;
    assert!(score_e1 > score_e2);
    assert!(score_e2 >= score_e3);
    assert!(score_e3 > 0.0);
}

#[test]
fn boolean_search_respects_parentheses() {
    let engine = engine();
    engine.create_entity("Alice", "person", &[]).unwrap();
    engine.create_entity("Bob", "person", &["engineer".to_string()]).unwrap();
    engine.create_entity("Acme", "company", &[]).unwrap();

    let filter = SearchFilter::default();
    let results =
        engine.search_boolean("name:Alice AND (type:person OR observation:engineer)", &filter).unwrap();

    assert_eq!(results, vec!["Alice".to_string()]);
}

#[test]
fn decay_half_life_yields_half_importance() {
    let engine = engine();
    engine.create_entity("Memory1", "note", &[]).unwrap();
    let now = Utc::now();
    engine
        .update_entity(
            "Memory1",
            EntityPatch {
                importance: Some(8),
                memory_type: Some(MemoryType::Semantic),
                last_accessed_at: Some(now - chrono::Duration::hours(168)),
                ..Default::default()
            },
        )
        .unwrap();
    let effective = engine.effective_importance("Memory1").unwrap();
    assert!((effective - 4.0).abs() < 1e-6, "expected 4.0, got {effective}");
}

#[test]
fn working_memory_expires_and_clears() {
    let engine = engine();
    engine.create_working_memory("s1", "note", "x", Some(0.001), 100).unwrap();
    sleep(Duration::from_millis(20));

    let removed = engine.clear_expired_working_memories().unwrap();
    assert_eq!(removed, 1);
    assert!(engine.session_memories("s1").unwrap().is_empty());
}

#[test]
fn context_packing_prefers_best_salience_per_token() {
    let engine = engine();
    for (name, importance) in [("Hot", 9u8), ("Mid", 8), ("Lo", 7)] {
        engine.create_entity(name, "memory", &[]).unwrap();
        engine
            .update_entity(
                name,
                EntityPatch { importance: Some(importance), memory_type: Some(MemoryType::Semantic), ..Default::default() },
            )
            .unwrap();
    }
    // Distinct observations (add_observation dedups identical text) so each
    // entity's token cost runs the opposite way from its salience: Hot is
    // the most salient (importance 9) but also the most expensive (~300
    // tokens), Lo the least salient (importance 7) but cheapest (~100).
    for i in 0..225 {
        engine.add_observation("Hot", &format!("w{i}")).unwrap();
    }
    for i in 0..150 {
        engine.add_observation("Mid", &format!("w{i}")).unwrap();
    }
    for i in 0..75 {
        engine.add_observation("Lo", &format!("w{i}")).unwrap();
    }

    let options = ContextOptions { max_tokens: 400, reserve_buffer: 0, ..ContextOptions::with_defaults() };
    let result = engine
        .retrieve_for_context(&SalienceWeights::default(), &SalienceContext::default(), &options)
        .unwrap();

    // Packing by raw salience would take Hot then Lo and drop Mid. Packing
    // by salience/token takes the two cheapest-per-point entities instead.
    assert!(result.included.contains(&"Mid".to_string()));
    assert!(result.included.contains(&"Lo".to_string()));
    assert!(!result.included.contains(&"Hot".to_string()));
    assert!(result.total_tokens <= 400);

    let hot_excluded = result.excluded.iter().find(|e| e.name == "Hot").expect("Hot excluded");
    assert_eq!(hot_excluded.reason, ExclusionReason::BudgetExceeded);
}

#[test]
fn budget_allocation_splits_across_memory_types() {
    let engine = engine();
    engine.create_entity("W1", "note", &[]).unwrap();
    engine.update_entity("W1", EntityPatch { memory_type: Some(MemoryType::Working), ..Default::default() }).unwrap();
    engine.create_entity("S1", "note", &[]).unwrap();
    engine.update_entity("S1", EntityPatch { memory_type: Some(MemoryType::Semantic), ..Default::default() }).unwrap();

    let options = ContextOptions::with_defaults();
    let allocation = BudgetAllocation::default();
    let result = engine
        .retrieve_with_budget_allocation(&SalienceWeights::default(), &SalienceContext::default(), &options, &allocation)
        .unwrap();

    assert!(result.total_tokens <= options.max_tokens);
}

#[test]
fn hierarchy_traversal_follows_parent_name() {
    let engine = engine();
    engine.create_entity("Root", "folder", &[]).unwrap();
    engine.create_entity("Child", "folder", &[]).unwrap();
    engine.create_entity("Grandchild", "folder", &[]).unwrap();
    engine.set_entity_parent("Child", Some("Root")).unwrap();
    engine.set_entity_parent("Grandchild", Some("Child")).unwrap();

    assert_eq!(engine.get_children("Root").unwrap(), vec!["Child".to_string()]);
    let mut descendants = engine.get_descendants("Root").unwrap();
    descendants.sort();
    assert_eq!(descendants, vec!["Child".to_string(), "Grandchild".to_string()]);
    assert_eq!(engine.get_ancestors("Grandchild").unwrap(), vec!["Child".to_string(), "Root".to_string()]);
}

#[test]
fn set_entity_parent_rejects_direct_and_indirect_cycles() {
    let engine = engine();
    engine.create_entity("A", "folder", &[]).unwrap();
    engine.create_entity("B", "folder", &[]).unwrap();
    engine.create_entity("C", "folder", &[]).unwrap();
    engine.set_entity_parent("B", Some("A")).unwrap();
    engine.set_entity_parent("C", Some("B")).unwrap();

    let self_parent = engine.set_entity_parent("A", Some("A")).unwrap_err();
    assert!(matches!(self_parent, GraphError::Cycle(_)));

    let indirect = engine.set_entity_parent("A", Some("C")).unwrap_err();
    assert!(matches!(indirect, GraphError::Cycle(_)));

    // The rejected assignment must not have been applied.
    assert!(engine.get_ancestors("A").unwrap().is_empty());
}

#[test]
fn update_entity_patch_also_rejects_cyclic_parent() {
    let engine = engine();
    engine.create_entity("A", "folder", &[]).unwrap();
    engine.create_entity("B", "folder", &[]).unwrap();
    engine.set_entity_parent("B", Some("A")).unwrap();

    let err = engine
        .update_entity("A", EntityPatch { parent_name: Some(Some("B".to_string())), ..Default::default() })
        .unwrap_err();
    assert!(matches!(err, GraphError::Cycle(_)));
}
