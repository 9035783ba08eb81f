//! The whitelist editing form: a sub-state-machine owned by the
//! presentation flow, layered over the root orchestrator.
//!
//! The form has its own store and action family. Submission runs through
//! the same async wrapper as every other remote operation; on success the
//! form closes and invalidates the parent `tokenholders` cell, which makes
//! the scheduler refetch the authoritative list. On failure the form stays
//! open with the error and the entered values.
//!
//! Tokenholder eligibility fields are instants, but the form edits calendar
//! dates. [`DateField`] keeps the underlying instant and only replaces it
//! when the date actually changes, so opening a record and resubmitting it
//! untouched reproduces the original instants exactly.

use std::any::Any;
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

use crate::action::{AnyAction, AppAction, AsyncLifecycle, StatePatch};
use crate::effect;
use crate::error::ValidationError;
use crate::model::{is_valid_address, Tokenholder};
use crate::remote::Remote;
use crate::runtime::Orchestrator;
use crate::store::Store;

/// Progress of the submission transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxStatus {
    #[default]
    Idle,
    Pending,
    Complete,
    Error,
}

/// An instant edited as a calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateField {
    instant: DateTime<Utc>,
}

impl DateField {
    pub fn from_instant(instant: DateTime<Utc>) -> Self {
        DateField { instant }
    }

    pub fn date(&self) -> NaiveDate {
        self.instant.date_naive()
    }

    /// Replace the instant only if the calendar date changed. An unchanged
    /// date keeps the original time-of-day intact.
    pub fn set_date(&mut self, date: NaiveDate) {
        if date != self.date() {
            self.instant = date.and_time(NaiveTime::MIN).and_utc();
        }
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }
}

/// The record under edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenholderDraft {
    pub address: String,
    pub can_send_after: DateField,
    pub can_receive_after: DateField,
    pub kyc_expiry: DateField,
    pub can_buy_from_sto: bool,
    pub is_accredited: bool,
}

impl TokenholderDraft {
    /// Defaults for a new entry: transfers allowed an hour from now, KYC
    /// valid for a year, sale participation on.
    pub fn new_record(now: DateTime<Utc>) -> Self {
        TokenholderDraft {
            address: String::new(),
            can_send_after: DateField::from_instant(now + Duration::hours(1)),
            can_receive_after: DateField::from_instant(now + Duration::hours(1)),
            kyc_expiry: DateField::from_instant(now + Duration::days(365)),
            can_buy_from_sto: true,
            is_accredited: false,
        }
    }

    pub fn from_record(record: &Tokenholder) -> Self {
        TokenholderDraft {
            address: record.address.clone(),
            can_send_after: DateField::from_instant(record.can_send_after),
            can_receive_after: DateField::from_instant(record.can_receive_after),
            kyc_expiry: DateField::from_instant(record.kyc_expiry),
            can_buy_from_sto: record.can_buy_from_sto,
            is_accredited: record.is_accredited,
        }
    }

    pub fn into_record(self) -> Tokenholder {
        Tokenholder {
            address: self.address,
            can_send_after: self.can_send_after.instant(),
            can_receive_after: self.can_receive_after.instant(),
            kyc_expiry: self.kyc_expiry.instant(),
            can_buy_from_sto: self.can_buy_from_sto,
            is_accredited: self.is_accredited,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct WhitelistFormState {
    pub visible: bool,
    /// The address being edited; `None` means a new record.
    pub editing_address: Option<String>,
    pub draft: Option<TokenholderDraft>,
    pub tx_status: TxStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormAction {
    Open {
        editing: Option<String>,
        draft: TokenholderDraft,
    },
    /// Mirror of the user's current input; kept so a failed submission
    /// does not lose entered values.
    DraftChanged(TokenholderDraft),
    Close,
    TxSend,
    TxReceipt,
    TxError(String),
}

impl AnyAction for FormAction {
    fn kind(&self) -> &'static str {
        match self {
            FormAction::Open { .. } => "OPEN_FORM",
            FormAction::DraftChanged(_) => "DRAFT_CHANGED",
            FormAction::Close => "CLOSE_FORM",
            FormAction::TxSend => "TX_SEND",
            FormAction::TxReceipt => "TX_RECEIPT",
            FormAction::TxError(_) => "TX_ERROR",
        }
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

impl AsyncLifecycle for FormAction {
    type Patch = ();

    fn completed(_: ()) -> Self {
        FormAction::TxReceipt
    }

    fn failed(message: String) -> Self {
        FormAction::TxError(message)
    }
}

pub fn reduce_form(mut state: WhitelistFormState, action: FormAction) -> WhitelistFormState {
    match action {
        FormAction::Open { editing, draft } => WhitelistFormState {
            visible: true,
            editing_address: editing,
            draft: Some(draft),
            tx_status: TxStatus::Idle,
            error: None,
        },
        FormAction::DraftChanged(draft) => {
            state.draft = Some(draft);
            state
        }
        FormAction::Close => WhitelistFormState::default(),
        FormAction::TxSend => {
            state.tx_status = TxStatus::Pending;
            state.error = None;
            state
        }
        FormAction::TxReceipt => {
            state.tx_status = TxStatus::Complete;
            state
        }
        FormAction::TxError(message) => {
            state.tx_status = TxStatus::Error;
            state.error = Some(message);
            state
        }
    }
}

/// The form machine: its own store plus a handle to the parent
/// orchestrator for lookups and invalidation.
pub struct WhitelistForm {
    store: Store<WhitelistFormState, FormAction>,
    orch: Arc<Orchestrator>,
}

impl WhitelistForm {
    pub fn new(orch: Arc<Orchestrator>) -> Self {
        WhitelistForm {
            store: Store::new("whitelist_form", reduce_form),
            orch,
        }
    }

    /// Open the form, pre-populated from the matching tokenholder when
    /// editing, or from the defaults when adding.
    pub fn open(&self, editing: Option<&str>) {
        let draft = editing
            .and_then(|address| {
                let state = self.orch.state();
                let holders = state.tokenholders.as_loaded()?;
                holders
                    .iter()
                    .find(|h| h.address.eq_ignore_ascii_case(address))
                    .map(TokenholderDraft::from_record)
            })
            .unwrap_or_else(|| TokenholderDraft::new_record(Utc::now()));

        self.store.dispatch(FormAction::Open {
            editing: editing.map(str::to_string),
            draft,
        });
    }

    pub fn close(&self) {
        self.store.dispatch(FormAction::Close);
    }

    pub fn state(&self) -> WhitelistFormState {
        self.store.snapshot()
    }

    /// Validate and submit the draft.
    ///
    /// Validation failures return before anything is dispatched or sent;
    /// remote failures land in the form state as a transaction error. On
    /// success the form closes and the parent tokenholder cell is
    /// invalidated so the scheduler refetches the authoritative list.
    pub async fn submit(&self, draft: TokenholderDraft) -> Result<(), ValidationError> {
        self.store.dispatch(FormAction::DraftChanged(draft.clone()));

        let app = self.orch.state();
        let handle = app
            .remote_handle
            .clone()
            .ok_or(ValidationError::NotConnected)?;
        let symbol = app
            .selected_token()
            .map(|t| t.symbol.clone())
            .ok_or(ValidationError::NoTokenSelected)?;

        let editing = self.store.with_state(|s| s.editing_address.clone());
        if editing.is_none() {
            if draft.address.is_empty() {
                return Err(ValidationError::MissingField("address"));
            }
            if !is_valid_address(&draft.address) {
                return Err(ValidationError::InvalidAddress);
            }
            let already_present = app.tokenholders.as_loaded().is_some_and(|holders| {
                holders
                    .iter()
                    .any(|h| h.address.eq_ignore_ascii_case(&draft.address))
            });
            if already_present {
                return Err(ValidationError::DuplicateAddress);
            }
        }

        let record = draft.into_record();
        effect::run(
            &|action| self.store.dispatch(action),
            FormAction::TxSend,
            async move {
                let tx = handle.modify_tokenholders(&symbol, &[record]).await?;
                tx.execute().await?;
                Ok(())
            },
        )
        .await;

        if self.store.with_state(|s| s.tx_status) == TxStatus::Complete {
            self.store.dispatch(FormAction::Close);
            self.orch.dispatch(AppAction::AsyncComplete(
                StatePatch::new().with_tokenholders(Remote::Unknown),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveDate, TimeZone};

    use super::*;
    use crate::action::AppAction;
    use crate::config::NetworkDirectory;
    use crate::model::TokenSummary;
    use crate::testing::{sample_tokenholder, wait_for, FakeConnector, FakeEnvironment, FakeLedger};

    fn draft_with_address(address: &str) -> TokenholderDraft {
        let mut draft = TokenholderDraft::new_record(Utc::now());
        draft.address = address.to_string();
        draft
    }

    async fn connected_form(ledger: Arc<FakeLedger>) -> (Arc<Orchestrator>, WhitelistForm) {
        ledger.set_tokens(vec![TokenSummary {
            symbol: "AAA".into(),
            name: "Token A".into(),
        }]);
        let orch = Orchestrator::new(
            Arc::new(FakeEnvironment::new(42, "0xwallet")),
            Arc::new(FakeConnector::new(ledger)),
            NetworkDirectory::builtin(),
        );
        orch.start();
        wait_for(&orch, |s| s.tokens.is_loaded()).await;
        orch.dispatch(AppAction::TokenSelected(0));
        wait_for(&orch, |s| s.tokenholders.is_loaded()).await;
        let form = WhitelistForm::new(orch.clone());
        (orch, form)
    }

    #[test]
    fn test_date_field_keeps_instant_when_date_unchanged() {
        let original = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap();
        let mut field = DateField::from_instant(original);

        field.set_date(NaiveDate::from_ymd_opt(2021, 3, 4).unwrap());
        assert_eq!(field.instant(), original);

        field.set_date(NaiveDate::from_ymd_opt(2021, 3, 5).unwrap());
        assert_eq!(
            field.instant(),
            Utc.with_ymd_and_hms(2021, 3, 5, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_draft_round_trip_reproduces_instants() {
        let record = Tokenholder {
            address: "0x1111111111111111111111111111111111111111".into(),
            can_send_after: Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap(),
            can_receive_after: Utc.with_ymd_and_hms(2021, 6, 7, 8, 9, 10).unwrap(),
            kyc_expiry: Utc.with_ymd_and_hms(2022, 1, 2, 3, 4, 5).unwrap(),
            can_buy_from_sto: false,
            is_accredited: true,
        };

        let mut draft = TokenholderDraft::from_record(&record);
        // Touch every date with its existing value, the way a form edit
        // cycle does.
        draft.can_send_after.set_date(draft.can_send_after.date());
        draft
            .can_receive_after
            .set_date(draft.can_receive_after.date());
        draft.kyc_expiry.set_date(draft.kyc_expiry.date());

        assert_eq!(draft.into_record(), record);
    }

    #[test]
    fn test_new_record_defaults() {
        let now = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let draft = TokenholderDraft::new_record(now);
        assert!(draft.address.is_empty());
        assert_eq!(draft.can_send_after.instant(), now + Duration::hours(1));
        assert_eq!(draft.can_receive_after.instant(), now + Duration::hours(1));
        assert_eq!(draft.kyc_expiry.instant(), now + Duration::days(365));
        assert!(draft.can_buy_from_sto);
        assert!(!draft.is_accredited);
    }

    #[test]
    fn test_form_lifecycle_transitions() {
        let draft = draft_with_address("0x1111111111111111111111111111111111111111");

        let state = reduce_form(
            WhitelistFormState::default(),
            FormAction::Open {
                editing: None,
                draft: draft.clone(),
            },
        );
        assert!(state.visible);
        assert_eq!(state.tx_status, TxStatus::Idle);

        let state = reduce_form(state, FormAction::TxSend);
        assert_eq!(state.tx_status, TxStatus::Pending);

        let state = reduce_form(state, FormAction::TxError("submission rejected: boom".into()));
        assert_eq!(state.tx_status, TxStatus::Error);
        assert!(state.visible);
        assert_eq!(state.draft, Some(draft));
        assert_eq!(state.error.as_deref(), Some("submission rejected: boom"));

        let state = reduce_form(state, FormAction::Close);
        assert_eq!(state, WhitelistFormState::default());
    }

    #[tokio::test]
    async fn test_submit_new_holder_closes_and_invalidates_parent() {
        let ledger = Arc::new(FakeLedger::new());
        let (orch, form) = connected_form(ledger.clone()).await;

        form.open(None);
        let mut draft = form.state().draft.unwrap();
        draft.address = "0x2222222222222222222222222222222222222222".into();
        form.submit(draft).await.unwrap();

        assert!(!form.state().visible);
        wait_for(&orch, |s| {
            s.tokenholders.as_loaded().is_some_and(|h| h.len() == 1)
        })
        .await;
        assert_eq!(ledger.calls("modify_tokenholders"), 1);
        // The refetch after invalidation, plus the initial fetch.
        assert_eq!(ledger.calls("tokenholders"), 2);
    }

    #[tokio::test]
    async fn test_submit_rejects_invalid_address_before_any_remote_call() {
        let ledger = Arc::new(FakeLedger::new());
        let (_orch, form) = connected_form(ledger.clone()).await;

        form.open(None);
        let err = form
            .submit(draft_with_address("not-an-address"))
            .await
            .unwrap_err();

        assert_eq!(err, ValidationError::InvalidAddress);
        assert_eq!(ledger.calls("modify_tokenholders"), 0);
        let state = form.state();
        assert!(state.visible);
        assert_eq!(state.tx_status, TxStatus::Idle);
    }

    #[tokio::test]
    async fn test_submit_rejects_duplicate_case_insensitively() {
        let ledger = Arc::new(FakeLedger::new());
        ledger.set_tokenholders(
            "AAA",
            vec![sample_tokenholder(
                "0xABCDEF0123456789ABCDEF0123456789ABCDEF01",
            )],
        );
        let (_orch, form) = connected_form(ledger.clone()).await;

        form.open(None);
        let err = form
            .submit(draft_with_address(
                "0xabcdef0123456789abcdef0123456789abcdef01",
            ))
            .await
            .unwrap_err();

        assert_eq!(err, ValidationError::DuplicateAddress);
        assert_eq!(ledger.calls("modify_tokenholders"), 0);
    }

    #[tokio::test]
    async fn test_edit_resubmit_keeps_original_instants() {
        let original = Tokenholder {
            address: "0x3333333333333333333333333333333333333333".into(),
            can_send_after: Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap(),
            can_receive_after: Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap(),
            kyc_expiry: Utc.with_ymd_and_hms(2022, 3, 4, 5, 6, 7).unwrap(),
            can_buy_from_sto: true,
            is_accredited: false,
        };
        let ledger = Arc::new(FakeLedger::new());
        ledger.set_tokenholders("AAA", vec![original.clone()]);
        let (orch, form) = connected_form(ledger.clone()).await;

        form.open(Some(&original.address));
        let mut draft = form.state().draft.unwrap();
        draft.can_send_after.set_date(draft.can_send_after.date());
        draft.kyc_expiry.set_date(draft.kyc_expiry.date());
        form.submit(draft).await.unwrap();

        wait_for(&orch, |s| {
            s.tokenholders.as_loaded().is_some_and(|h| h.len() == 1)
        })
        .await;
        let state = orch.state();
        let stored = &state.tokenholders.as_loaded().unwrap()[0];
        assert_eq!(stored, &original);
    }

    #[tokio::test]
    async fn test_remote_failure_keeps_form_open_with_values() {
        let ledger = Arc::new(FakeLedger::new());
        ledger.fail_next("modify_tokenholders", "boom");
        let (orch, form) = connected_form(ledger.clone()).await;

        form.open(None);
        let draft = draft_with_address("0x4444444444444444444444444444444444444444");
        form.submit(draft.clone()).await.unwrap();

        let state = form.state();
        assert!(state.visible);
        assert_eq!(state.tx_status, TxStatus::Error);
        assert_eq!(state.error.as_deref(), Some("submission rejected: boom"));
        assert_eq!(state.draft, Some(draft));
        // The parent cell was not invalidated.
        assert!(orch.state().tokenholders.is_loaded());
        assert_eq!(ledger.calls("tokenholders"), 1);
    }
}
