//! End-to-end workflow tests: open a dialog, submit it, and check how the
//! engine reconciles views and messages with the remote outcome.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use formwork_core::{
    ActionResult, DialogService, DialogStatus, FieldDefinition, FieldValue, FormEvent,
    FormEventHandler, HandlerRegistry, OperationRef, RecordName, RecordSnapshot, RecordType,
    RefreshTarget, SettingsProvider, SubmitOutcome, WorkflowError, WorkflowId,
};
use formwork_test_utils::{
    record_snapshot, MemoryMessageSink, MemorySettings, MemoryViewHost, MockRemoteGateway,
    StubGateway, WorkflowBuilder,
};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// The recurring three-field dialog: a date range plus a flag.
fn order_window_workflow() -> formwork_core::WorkflowDefinition {
    WorkflowBuilder::new("rebuild_order_lines")
        .title("Add lines based on Daily Orders")
        .field(FieldDefinition::date("from_date").with_label("Date From").required())
        .field(FieldDefinition::date("to_date").with_label("Date To").required())
        .field(FieldDefinition::boolean("only_flag").with_default(FieldValue::Bool(true)))
        .operation("daily_orders.rebuild_lines")
        .refresh_list("Purchase Order")
        .build()
}

struct Harness {
    gateway: Arc<StubGateway>,
    views: Arc<MemoryViewHost>,
    messages: Arc<MemoryMessageSink>,
    service: DialogService,
}

fn harness(gateway: StubGateway, workflows: Vec<formwork_core::WorkflowDefinition>) -> Harness {
    let gateway = Arc::new(gateway);
    let views = Arc::new(MemoryViewHost::new());
    let messages = Arc::new(MemoryMessageSink::new());
    let service = DialogService::new(
        workflows,
        gateway.clone(),
        views.clone(),
        messages.clone(),
    )
    .unwrap();
    Harness {
        gateway,
        views,
        messages,
        service,
    }
}

fn dispatched(outcome: SubmitOutcome) -> JoinHandle<()> {
    match outcome {
        SubmitOutcome::Dispatched { task } => task,
        other => panic!("Expected Dispatched, got {:?}", other),
    }
}

#[tokio::test]
async fn submitted_dialog_dispatches_once_and_reconciles_list() {
    init_tracing();
    let (gateway, gate) = StubGateway::respond_with(ActionResult::with_message("queued")).gated();
    let h = harness(gateway, vec![order_window_workflow()]);

    let po_list = RecordType::new("Purchase Order");
    h.views
        .open_list(&po_list, vec![RecordName::new("PO-0001")]);

    let dialog_id = h
        .service
        .open(&WorkflowId::new("rebuild_order_lines"), &BTreeMap::new())
        .unwrap();
    h.service
        .set_value(&dialog_id, "from_date", FieldValue::Date(date(2022, 11, 20)))
        .unwrap();
    h.service
        .set_value(&dialog_id, "to_date", FieldValue::Date(date(2022, 11, 23)))
        .unwrap();

    let task = dispatched(h.service.submit(&dialog_id).unwrap());

    // Hidden the moment the call is dispatched, before any response
    let dialog = h.service.dialog(&dialog_id).unwrap();
    assert!(dialog.is_hidden());
    assert_eq!(dialog.status, DialogStatus::AwaitingResponse);
    assert_eq!(h.views.list_reloads(&po_list), 0);

    gate.release();
    task.await.unwrap();

    // Exactly one call, carrying exactly the three visible parameters
    assert_eq!(h.gateway.invocation_count(), 1);
    let (operation, request) = &h.gateway.invocations()[0];
    assert_eq!(operation.0, "daily_orders.rebuild_lines");
    assert_eq!(request.len(), 3);
    assert_eq!(
        request.get("from_date"),
        Some(&FieldValue::Date(date(2022, 11, 20)))
    );
    assert_eq!(
        request.get("to_date"),
        Some(&FieldValue::Date(date(2022, 11, 23)))
    );
    assert_eq!(request.get("only_flag"), Some(&FieldValue::Bool(true)));

    // Populated success: list reloaded once, message shown verbatim
    assert_eq!(h.views.list_reloads(&po_list), 1);
    assert_eq!(h.messages.messages(), vec!["queued"]);
    assert_eq!(
        h.service.dialog(&dialog_id).unwrap().status,
        DialogStatus::Completed
    );
}

#[tokio::test]
async fn missing_required_field_keeps_dialog_open_with_zero_calls() {
    let h = harness(
        StubGateway::respond_empty(),
        vec![order_window_workflow()],
    );

    let dialog_id = h
        .service
        .open(&WorkflowId::new("rebuild_order_lines"), &BTreeMap::new())
        .unwrap();
    h.service
        .set_value(&dialog_id, "from_date", FieldValue::Date(date(2022, 11, 20)))
        .unwrap();

    match h.service.submit(&dialog_id).unwrap() {
        SubmitOutcome::ValidationFailed { field_errors } => {
            assert_eq!(field_errors.len(), 1);
            assert_eq!(field_errors[0].field, "to_date");
        }
        other => panic!("Expected ValidationFailed, got {:?}", other),
    }

    let dialog = h.service.dialog(&dialog_id).unwrap();
    assert_eq!(dialog.status, DialogStatus::Open);
    assert!(!dialog.is_hidden());
    assert!(dialog.field("to_date").unwrap().error.is_some());
    assert_eq!(h.gateway.invocation_count(), 0);

    // Filling the field makes the next submit go through
    h.service
        .set_value(&dialog_id, "to_date", FieldValue::Date(date(2022, 11, 23)))
        .unwrap();
    let task = dispatched(h.service.submit(&dialog_id).unwrap());
    task.await.unwrap();
    assert_eq!(h.gateway.invocation_count(), 1);
}

#[tokio::test]
async fn hidden_conditional_field_is_excluded_from_submission() {
    let workflow = WorkflowBuilder::new("update_orders")
        .title("Update Orders?")
        .field(
            FieldDefinition::select("update_existing_orders", &["No", "Yes"])
                .with_label("Update existing orders?")
                .required()
                .with_default(FieldValue::from("No")),
        )
        .field(
            FieldDefinition::date("delivery_date_start")
                .with_label("Starting with Delivery Date:")
                .visible_when("update_existing_orders", FieldValue::from("Yes")),
        )
        .operation("pricing.recalculate_order_prices")
        .build();
    let h = harness(StubGateway::respond_empty(), vec![workflow]);

    let dialog_id = h
        .service
        .open(&WorkflowId::new("update_orders"), &BTreeMap::new())
        .unwrap();

    // Toggling the select shows the dependent date field
    h.service
        .set_value(&dialog_id, "update_existing_orders", FieldValue::from("Yes"))
        .unwrap();
    assert!(
        h.service
            .dialog(&dialog_id)
            .unwrap()
            .field("delivery_date_start")
            .unwrap()
            .visible
    );
    h.service
        .set_value(
            &dialog_id,
            "delivery_date_start",
            FieldValue::Date(date(2022, 12, 1)),
        )
        .unwrap();

    // Toggling back hides it again; the stored value must stay out of
    // the submitted request
    h.service
        .set_value(&dialog_id, "update_existing_orders", FieldValue::from("No"))
        .unwrap();
    let dialog = h.service.dialog(&dialog_id).unwrap();
    assert!(!dialog.field("delivery_date_start").unwrap().visible);
    assert_eq!(
        dialog.value_of("delivery_date_start"),
        Some(&FieldValue::Date(date(2022, 12, 1)))
    );

    let task = dispatched(h.service.submit(&dialog_id).unwrap());
    task.await.unwrap();

    let (_, request) = &h.gateway.invocations()[0];
    assert!(!request.contains("delivery_date_start"));
    assert_eq!(request.len(), 1);
    assert_eq!(
        request.get("update_existing_orders"),
        Some(&FieldValue::Text("No".to_string()))
    );
}

#[tokio::test]
async fn remote_failure_refreshes_nothing_and_surfaces_via_transport() {
    init_tracing();
    let messages = Arc::new(MemoryMessageSink::new());
    let gateway =
        StubGateway::failing("internal server error").with_error_sink(messages.clone());

    let gateway = Arc::new(gateway);
    let views = Arc::new(MemoryViewHost::new());
    let service = DialogService::new(
        vec![order_window_workflow()],
        gateway.clone(),
        views.clone(),
        messages.clone(),
    )
    .unwrap();

    let po_list = RecordType::new("Purchase Order");
    views.open_list(&po_list, vec![RecordName::new("PO-0001")]);

    let dialog_id = service
        .open(&WorkflowId::new("rebuild_order_lines"), &BTreeMap::new())
        .unwrap();
    service
        .set_value(&dialog_id, "from_date", FieldValue::Date(date(2022, 11, 20)))
        .unwrap();
    service
        .set_value(&dialog_id, "to_date", FieldValue::Date(date(2022, 11, 23)))
        .unwrap();

    let task = dispatched(service.submit(&dialog_id).unwrap());
    task.await.unwrap();

    // No refresh; the dialog was already hidden and stays hidden; the
    // generic error came through the transport's own channel
    assert_eq!(views.list_reloads(&po_list), 0);
    let dialog = service.dialog(&dialog_id).unwrap();
    assert_eq!(dialog.status, DialogStatus::Failed);
    assert!(dialog.is_hidden());
    assert_eq!(messages.messages(), vec!["Server error: internal server error"]);
}

#[tokio::test]
async fn second_submit_is_rejected_while_first_is_in_flight() {
    let (gateway, gate) = StubGateway::respond_empty().gated();
    let h = harness(gateway, vec![order_window_workflow()]);

    let dialog_id = h
        .service
        .open(&WorkflowId::new("rebuild_order_lines"), &BTreeMap::new())
        .unwrap();
    h.service
        .set_value(&dialog_id, "from_date", FieldValue::Date(date(2022, 11, 20)))
        .unwrap();
    h.service
        .set_value(&dialog_id, "to_date", FieldValue::Date(date(2022, 11, 23)))
        .unwrap();

    let task = dispatched(h.service.submit(&dialog_id).unwrap());

    assert!(matches!(
        h.service.submit(&dialog_id),
        Err(WorkflowError::SubmitInFlight(_))
    ));
    // Editing while in flight is rejected too
    assert!(matches!(
        h.service
            .set_value(&dialog_id, "from_date", FieldValue::Date(date(2023, 1, 1))),
        Err(WorkflowError::InvalidState(_))
    ));

    gate.release();
    task.await.unwrap();

    assert_eq!(h.gateway.invocation_count(), 1);
    // A settled dialog never accepts another submit either
    assert!(matches!(
        h.service.submit(&dialog_id),
        Err(WorkflowError::InvalidState(_))
    ));
}

#[tokio::test]
async fn unbound_operation_fails_fast_without_calling() {
    let workflow = WorkflowBuilder::new("orphan_dialog")
        .field(FieldDefinition::text("anything"))
        .build();
    let h = harness(StubGateway::respond_empty(), vec![workflow]);

    let dialog_id = h
        .service
        .open(&WorkflowId::new("orphan_dialog"), &BTreeMap::new())
        .unwrap();

    assert!(matches!(
        h.service.submit(&dialog_id),
        Err(WorkflowError::OperationNotBound(_))
    ));
    assert_eq!(h.gateway.invocation_count(), 0);
    // Failing fast leaves the dialog untouched
    assert_eq!(
        h.service.dialog(&dialog_id).unwrap().status,
        DialogStatus::Open
    );
}

#[tokio::test]
async fn empty_success_triggers_no_refresh_and_no_message() {
    let h = harness(StubGateway::respond_empty(), vec![order_window_workflow()]);

    let po_list = RecordType::new("Purchase Order");
    h.views.open_list(&po_list, vec![]);

    let dialog_id = h
        .service
        .open(&WorkflowId::new("rebuild_order_lines"), &BTreeMap::new())
        .unwrap();
    h.service
        .set_value(&dialog_id, "from_date", FieldValue::Date(date(2022, 11, 20)))
        .unwrap();
    h.service
        .set_value(&dialog_id, "to_date", FieldValue::Date(date(2022, 11, 23)))
        .unwrap();

    let task = dispatched(h.service.submit(&dialog_id).unwrap());
    task.await.unwrap();

    assert_eq!(h.gateway.invocation_count(), 1);
    assert_eq!(h.views.list_reloads(&po_list), 0);
    assert!(h.messages.messages().is_empty());
    assert_eq!(
        h.service.dialog(&dialog_id).unwrap().status,
        DialogStatus::Completed
    );
}

#[tokio::test]
async fn refresh_is_a_no_op_when_the_view_was_discarded_mid_flight() {
    let (gateway, gate) =
        StubGateway::respond_with(ActionResult::with_message("done")).gated();
    let h = harness(gateway, vec![order_window_workflow()]);

    let po_list = RecordType::new("Purchase Order");
    h.views.open_list(&po_list, vec![]);

    let dialog_id = h
        .service
        .open(&WorkflowId::new("rebuild_order_lines"), &BTreeMap::new())
        .unwrap();
    h.service
        .set_value(&dialog_id, "from_date", FieldValue::Date(date(2022, 11, 20)))
        .unwrap();
    h.service
        .set_value(&dialog_id, "to_date", FieldValue::Date(date(2022, 11, 23)))
        .unwrap();

    let task = dispatched(h.service.submit(&dialog_id).unwrap());

    // The user navigates away while the call is pending
    h.views.close_list(&po_list);
    gate.release();
    task.await.unwrap();

    // The handler still settled: message shown, no reload attempted
    assert_eq!(h.messages.messages(), vec!["done"]);
    assert_eq!(h.views.list_reloads(&po_list), 0);
    assert_eq!(
        h.service.dialog(&dialog_id).unwrap().status,
        DialogStatus::Completed
    );
}

#[tokio::test]
async fn open_resolves_defaults_once() {
    let workflow = WorkflowBuilder::new("weighted_price")
        .title("Weighted Price Calculator")
        .field(FieldDefinition::reference("item_code", RecordType::new("Item")).required())
        .field(
            FieldDefinition::date("as_of_date")
                .with_label("Price Date")
                .required()
                .default_current_date(),
        )
        .field(FieldDefinition::numeric("discount_price").required())
        .operation("pricing.show_weighted_discounts")
        .build();
    let h = harness(StubGateway::respond_empty(), vec![workflow]);

    let today = Utc::now().date_naive();
    let dialog_id = h
        .service
        .open(&WorkflowId::new("weighted_price"), &BTreeMap::new())
        .unwrap();

    let dialog = h.service.dialog(&dialog_id).unwrap();
    assert_eq!(dialog.fields.len(), 3);
    assert_eq!(dialog.value_of("as_of_date"), Some(&FieldValue::Date(today)));

    // Later edits re-evaluate visibility but never re-resolve defaults
    h.service
        .set_value(
            &dialog_id,
            "item_code",
            FieldValue::Reference(RecordName::new("ITEM-42")),
        )
        .unwrap();
    assert_eq!(
        h.service.dialog(&dialog_id).unwrap().value_of("as_of_date"),
        Some(&FieldValue::Date(today))
    );
}

#[tokio::test]
async fn caller_defaults_seed_the_dialog_from_the_record() {
    let workflow = WorkflowBuilder::new("update_orders")
        .field(
            FieldDefinition::select("update_existing_orders", &["No", "Yes"])
                .required()
                .with_default(FieldValue::from("No")),
        )
        .field(FieldDefinition::date("delivery_date_start")
            .visible_when("update_existing_orders", FieldValue::from("Yes")))
        .operation("pricing.recalculate_order_prices")
        .build();
    let h = harness(StubGateway::respond_empty(), vec![workflow]);

    // The form seeds the start date from the document being edited
    let mut defaults = BTreeMap::new();
    defaults.insert(
        "delivery_date_start".to_string(),
        FieldValue::Date(date(2022, 11, 20)),
    );

    let dialog_id = h
        .service
        .open(&WorkflowId::new("update_orders"), &defaults)
        .unwrap();
    assert_eq!(
        h.service
            .dialog(&dialog_id)
            .unwrap()
            .value_of("delivery_date_start"),
        Some(&FieldValue::Date(date(2022, 11, 20)))
    );
}

#[tokio::test]
async fn dismissed_dialog_never_calls_out() {
    let h = harness(StubGateway::respond_empty(), vec![order_window_workflow()]);

    let dialog_id = h
        .service
        .open(&WorkflowId::new("rebuild_order_lines"), &BTreeMap::new())
        .unwrap();
    h.service.dismiss(&dialog_id).unwrap();

    let dialog = h.service.dialog(&dialog_id).unwrap();
    assert_eq!(dialog.status, DialogStatus::Cancelled);
    assert!(dialog.is_hidden());
    assert!(matches!(
        h.service.submit(&dialog_id),
        Err(WorkflowError::InvalidState(_))
    ));
    assert_eq!(h.gateway.invocation_count(), 0);
}

#[tokio::test]
async fn direct_invocation_reloads_the_record() {
    let h = harness(
        StubGateway::respond_with(ActionResult::with_records(vec![RecordName::new("PO-0001")])),
        vec![order_window_workflow()],
    );

    let po = RecordType::new("Purchase Order");
    let name = RecordName::new("PO-0001");
    h.views.open_record(&po, &name);

    // The status-change button skips the dialog entirely
    let task = h
        .service
        .invoke_now(
            OperationRef::new("purchase_order.update_status"),
            formwork_core::ActionRequest::new().with("status", FieldValue::from("Closed")),
            RefreshTarget::Record(po.clone(), name.clone()),
        )
        .unwrap();
    task.await.unwrap();

    assert_eq!(h.gateway.invocation_count(), 1);
    assert_eq!(h.views.record_reload_count(&po, &name), 1);
    assert!(h.messages.messages().is_empty());
}

#[tokio::test]
async fn mockall_gateway_can_script_expectations() {
    let mut mock = MockRemoteGateway::new();
    mock.expect_invoke()
        .times(1)
        .returning(|_, _| Ok(ActionResult::with_message("scripted")));

    let views = Arc::new(MemoryViewHost::new());
    let messages = Arc::new(MemoryMessageSink::new());
    let service = DialogService::new(
        vec![order_window_workflow()],
        Arc::new(mock),
        views.clone(),
        messages.clone(),
    )
    .unwrap();

    let dialog_id = service
        .open(&WorkflowId::new("rebuild_order_lines"), &BTreeMap::new())
        .unwrap();
    service
        .set_value(&dialog_id, "from_date", FieldValue::Date(date(2022, 11, 20)))
        .unwrap();
    service
        .set_value(&dialog_id, "to_date", FieldValue::Date(date(2022, 11, 23)))
        .unwrap();

    let task = dispatched(service.submit(&dialog_id).unwrap());
    task.await.unwrap();
    assert_eq!(messages.messages(), vec!["scripted"]);
}

/// Opens the update-orders dialog after a price record saves, gated on a
/// server-held settings flag.
struct PriceChangeHandler {
    service: Arc<DialogService>,
    settings: Arc<MemorySettings>,
    opened: Mutex<Option<formwork_core::DialogId>>,
}

#[async_trait]
impl FormEventHandler for PriceChangeHandler {
    fn handler_name(&self) -> &str {
        "price_change_dialog"
    }

    async fn on_event(
        &self,
        event: &FormEvent,
        record: &RecordSnapshot,
    ) -> Result<(), WorkflowError> {
        if *event != FormEvent::AfterSave {
            return Ok(());
        }
        if !self.settings.flag("open_dialog_on_price_change").await? {
            return Ok(());
        }

        let mut defaults = BTreeMap::new();
        if let Some(valid_from) = record.field_str("valid_from") {
            defaults.insert(
                "delivery_date_start".to_string(),
                FieldValue::from_json(&serde_json::Value::String(valid_from.to_string())),
            );
        }
        let dialog_id = self
            .service
            .open(&WorkflowId::new("update_orders"), &defaults)?;
        *self.opened.lock().unwrap() = Some(dialog_id);
        Ok(())
    }
}

#[tokio::test]
async fn after_save_handler_opens_dialog_only_when_the_flag_is_set() {
    let workflow = WorkflowBuilder::new("update_orders")
        .title("Update Orders?")
        .field(
            FieldDefinition::select("update_existing_orders", &["No", "Yes"])
                .required()
                .with_default(FieldValue::from("No")),
        )
        .field(FieldDefinition::date("delivery_date_start")
            .visible_when("update_existing_orders", FieldValue::from("Yes")))
        .operation("pricing.recalculate_order_prices")
        .build();

    let service = Arc::new(
        DialogService::new(
            vec![workflow],
            Arc::new(StubGateway::respond_empty()),
            Arc::new(MemoryViewHost::new()),
            Arc::new(MemoryMessageSink::new()),
        )
        .unwrap(),
    );
    let settings = Arc::new(MemorySettings::new());
    let handler = Arc::new(PriceChangeHandler {
        service: service.clone(),
        settings: settings.clone(),
        opened: Mutex::new(None),
    });

    let registry = HandlerRegistry::builder()
        .on(RecordType::new("Item Price"), handler.clone())
        .build();

    let snapshot = record_snapshot(
        "Item Price",
        "PRICE-0001",
        &[("valid_from", serde_json::json!("2022-11-20"))],
    );

    // Flag off: saving opens nothing
    registry
        .dispatch(&FormEvent::AfterSave, &snapshot)
        .await
        .unwrap();
    assert!(handler.opened.lock().unwrap().is_none());

    // Flag on: the dialog opens, seeded from the record
    settings.set_flag("open_dialog_on_price_change", true);
    registry
        .dispatch(&FormEvent::AfterSave, &snapshot)
        .await
        .unwrap();

    let dialog_id = handler.opened.lock().unwrap().clone().unwrap();
    let dialog = service.dialog(&dialog_id).unwrap();
    assert_eq!(
        dialog.value_of("delivery_date_start"),
        Some(&FieldValue::Date(date(2022, 11, 20)))
    );

    // Unrelated events pass through without opening anything
    *handler.opened.lock().unwrap() = None;
    registry
        .dispatch(&FormEvent::Refresh, &snapshot)
        .await
        .unwrap();
    assert!(handler.opened.lock().unwrap().is_none());
}
