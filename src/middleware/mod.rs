//! HTTP middleware. Only the `X-API-Key` check survives from the
//! teacher's much larger middleware pipeline (guardrails, RBAC, PII
//! vaulting, anomaly detection, etc. have no counterpart in this spec).

pub mod auth;
