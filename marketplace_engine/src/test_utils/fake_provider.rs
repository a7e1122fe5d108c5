//! An in-memory [`PaymentProvider`] that behaves like a hosted checkout, without the network.
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
        Mutex,
    },
};

use crate::{
    db_types::Cents,
    traits::{
        PaymentHandle,
        PaymentProvider,
        PaymentProviderError,
        ProviderPaymentStatus,
        ProviderSession,
        ProviderSessionLine,
        ProviderSessionRequest,
        SessionHandle,
    },
};

#[derive(Clone, Default)]
pub struct FakePaymentProvider {
    sessions: Arc<Mutex<HashMap<String, ProviderSession>>>,
    requests: Arc<Mutex<Vec<ProviderSessionRequest>>>,
    counter: Arc<AtomicUsize>,
    retrievals: Arc<AtomicUsize>,
    transient_failures: Arc<AtomicUsize>,
    reject_create: Arc<Mutex<Option<String>>>,
}

impl FakePaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the buyer completing payment on the hosted page.
    pub fn pay(&self, session_id: &str) {
        self.set_status(session_id, ProviderPaymentStatus::Paid);
    }

    pub fn set_status(&self, session_id: &str, status: ProviderPaymentStatus) {
        let mut sessions = self.sessions.lock().expect("poisoned");
        if let Some(s) = sessions.get_mut(session_id) {
            s.payment_status = status;
        }
    }

    /// Registers a session directly, e.g. one whose amounts differ from what checkout would have asked for.
    pub fn insert_session(&self, session: ProviderSession) {
        self.sessions.lock().expect("poisoned").insert(session.session_id.clone(), session);
    }

    pub fn session(&self, session_id: &str) -> Option<ProviderSession> {
        self.sessions.lock().expect("poisoned").get(session_id).cloned()
    }

    /// Every request passed to `create_session`, in order.
    pub fn requests(&self) -> Vec<ProviderSessionRequest> {
        self.requests.lock().expect("poisoned").clone()
    }

    /// How many times `retrieve_session` has been called.
    pub fn retrievals(&self) -> usize {
        self.retrievals.load(Ordering::SeqCst)
    }

    /// The next `n` calls to `retrieve_session` fail as if the provider were unreachable.
    pub fn fail_next_retrievals(&self, n: usize) {
        self.transient_failures.store(n, Ordering::SeqCst);
    }

    pub fn reject_sessions(&self, reason: &str) {
        *self.reject_create.lock().expect("poisoned") = Some(reason.to_string());
    }
}

impl PaymentProvider for FakePaymentProvider {
    async fn create_session(&self, request: ProviderSessionRequest) -> Result<SessionHandle, PaymentProviderError> {
        if let Some(reason) = self.reject_create.lock().expect("poisoned").clone() {
            return Err(PaymentProviderError::Rejected(reason));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        let session_id = format!("cs_test_{n:04}");
        let subtotal = request.line_items.iter().map(|l| l.amount()).sum::<Cents>();
        let line_items = request
            .line_items
            .iter()
            .map(|l| ProviderSessionLine {
                product_id: Some(l.product_id),
                name: l.name.clone(),
                unit_amount: l.unit_amount,
                quantity: l.quantity,
                amount_total: l.amount(),
                image_url: l.image_url.clone(),
            })
            .collect();
        let session = ProviderSession {
            session_id: session_id.clone(),
            payment_status: ProviderPaymentStatus::Unpaid,
            amount_subtotal: subtotal,
            amount_total: subtotal + request.tax + request.shipping,
            shipping_cost: request.shipping,
            line_items,
            payment_handle: Some(format!("pi_test_{n:04}")),
            customer_email: request.customer_email.clone(),
            metadata: request.metadata.clone().into_iter().collect(),
        };
        self.sessions.lock().expect("poisoned").insert(session_id.clone(), session);
        self.requests.lock().expect("poisoned").push(request);
        let redirect_url = format!("https://checkout.example.com/pay/{session_id}");
        Ok(SessionHandle { session_id, redirect_url })
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<ProviderSession, PaymentProviderError> {
        self.retrievals.fetch_add(1, Ordering::SeqCst);
        let failures = self.transient_failures.load(Ordering::SeqCst);
        if failures > 0 {
            self.transient_failures.store(failures - 1, Ordering::SeqCst);
            return Err(PaymentProviderError::Unavailable("connection reset".into()));
        }
        self.session(session_id)
            .ok_or_else(|| PaymentProviderError::Rejected(format!("No such checkout session: {session_id}")))
    }

    async fn retrieve_payment_handle(&self, handle_id: &str) -> Result<PaymentHandle, PaymentProviderError> {
        Ok(PaymentHandle {
            id: handle_id.to_string(),
            status: "succeeded".into(),
            card_brand: Some("visa".into()),
            card_last4: Some("4242".into()),
        })
    }
}
