//! Logical tables the dashboard reads and writes.

use std::fmt;

/// Closed set of table kinds, each mapped to its naming-convention prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    /// Booked appointments (`starts_at`, `status`, `value`).
    Appointments,
    /// Newly onboarded clients (`created_at`).
    WelcomeClients,
    /// Lapsed clients targeted for re-engagement (`last_visit_date`).
    RetargetingClients,
    /// Clients with a pending follow-up (`due_date`).
    FollowupClients,
    /// Emails sent to retargeting clients.
    RetargetingEmailLogs,
    /// Emails sent to follow-up clients.
    FollowupEmailLogs,
    /// Dashboard users; the only global table.
    Users,
}

impl TableKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 7] = [
        Self::Appointments,
        Self::WelcomeClients,
        Self::RetargetingClients,
        Self::FollowupClients,
        Self::RetargetingEmailLogs,
        Self::FollowupEmailLogs,
        Self::Users,
    ];

    /// Prefix shared by this kind's tables across tenants.
    ///
    /// # Examples
    /// ```
    /// use backend::domain::TableKind;
    ///
    /// assert_eq!(TableKind::WelcomeClients.prefix(), "clients_welcome");
    /// ```
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Appointments => "appointments_table",
            Self::WelcomeClients => "clients_welcome",
            Self::RetargetingClients => "clients_retargeting",
            Self::FollowupClients => "clients_followup",
            Self::RetargetingEmailLogs => "email_logs_table_retargeting",
            Self::FollowupEmailLogs => "email_logs_table_followup",
            Self::Users => "users",
        }
    }

    /// Whether tables of this kind exist once per tenant.
    pub const fn is_tenant_scoped(self) -> bool {
        !matches!(self, Self::Users)
    }

    /// Human-readable label used in error messages.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Appointments => "Appointments",
            Self::WelcomeClients => "Welcome clients",
            Self::RetargetingClients => "Retargeting clients",
            Self::FollowupClients => "Follow-up clients",
            Self::RetargetingEmailLogs => "Retargeting email logs",
            Self::FollowupEmailLogs => "Follow-up email logs",
            Self::Users => "Users",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}
