pub const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS frameworks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'Active',
    sebi_ai_enabled INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS policies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL,
    framework_id INTEGER NOT NULL REFERENCES frameworks(id),
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS sub_policies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL,
    policy_id INTEGER NOT NULL REFERENCES policies(id),
    name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS compliances (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL,
    sub_policy_id INTEGER NOT NULL REFERENCES sub_policies(id),
    title TEXT NOT NULL,
    description TEXT NOT NULL,
    criticality TEXT NOT NULL DEFAULT 'Medium',
    is_risk INTEGER NOT NULL DEFAULT 0,
    mitigation TEXT,
    possible_damage TEXT,
    mandatory INTEGER NOT NULL DEFAULT 1,
    ai_bse_enabled INTEGER NOT NULL DEFAULT 0,
    permanent_temporary TEXT NOT NULL DEFAULT 'Permanent',
    status TEXT NOT NULL DEFAULT 'Approved',
    active_inactive TEXT NOT NULL DEFAULT 'Active'
);

CREATE TABLE IF NOT EXISTS audits (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL,
    framework_id INTEGER NOT NULL REFERENCES frameworks(id),
    policy_id INTEGER REFERENCES policies(id),
    sub_policy_id INTEGER REFERENCES sub_policies(id),
    title TEXT NOT NULL,
    scope TEXT,
    objective TEXT,
    business_unit TEXT,
    audit_type TEXT NOT NULL DEFAULT 'AI',
    status TEXT NOT NULL DEFAULT 'YetToStart',
    due_date TEXT NOT NULL,
    completion_date TEXT,
    filing_type TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS evidence_documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL,
    audit_id INTEGER NOT NULL REFERENCES audits(id) ON DELETE CASCADE,
    logical_name TEXT NOT NULL,
    stored_path TEXT NOT NULL,
    size INTEGER NOT NULL DEFAULT 0,
    mime_type TEXT NOT NULL,
    content_sha256 TEXT,
    external_source TEXT NOT NULL DEFAULT 'manual',
    external_id TEXT,
    processing_state TEXT NOT NULL DEFAULT 'pending',
    policy_id INTEGER,
    sub_policy_id INTEGER,
    compliance_id INTEGER,
    compliance_status TEXT,
    confidence REAL,
    analysis_json TEXT,
    processing_note TEXT,
    uploaded_at TEXT NOT NULL,
    processed_at TEXT
);

CREATE TABLE IF NOT EXISTS checklist_verifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL,
    compliance_id INTEGER NOT NULL,
    sub_policy_id INTEGER NOT NULL,
    policy_id INTEGER NOT NULL,
    framework_id INTEGER NOT NULL,
    complied TEXT NOT NULL,
    comments TEXT NOT NULL DEFAULT '',
    verifier TEXT NOT NULL,
    verified_at TEXT NOT NULL,
    count INTEGER NOT NULL DEFAULT 1,
    UNIQUE (tenant_id, compliance_id, sub_policy_id, policy_id, framework_id)
);

CREATE TABLE IF NOT EXISTS audit_findings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL,
    audit_id INTEGER NOT NULL REFERENCES audits(id) ON DELETE CASCADE,
    compliance_id INTEGER NOT NULL,
    check_status TEXT NOT NULL DEFAULT '0',
    major_minor TEXT NOT NULL DEFAULT 'minor',
    severity_rating TEXT NOT NULL DEFAULT '0',
    comments TEXT NOT NULL DEFAULT '',
    impact TEXT NOT NULL DEFAULT '',
    recommendation TEXT NOT NULL DEFAULT '',
    how_to_verify TEXT NOT NULL DEFAULT '',
    why_to_verify TEXT NOT NULL DEFAULT '',
    what_to_verify TEXT NOT NULL DEFAULT '',
    underlying_cause TEXT NOT NULL DEFAULT '',
    suggested_action_plan TEXT NOT NULL DEFAULT '',
    predictive_risks TEXT NOT NULL DEFAULT '[]',
    corrective_actions TEXT NOT NULL DEFAULT '[]',
    review_status TEXT NOT NULL DEFAULT 'pending_review',
    checked_date TEXT,
    UNIQUE (tenant_id, audit_id, compliance_id)
);

CREATE TABLE IF NOT EXISTS cross_framework_mappings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id INTEGER NOT NULL,
    document_id INTEGER NOT NULL REFERENCES evidence_documents(id) ON DELETE CASCADE,
    compliance_id INTEGER NOT NULL,
    framework_id INTEGER NOT NULL,
    status TEXT NOT NULL,
    score REAL NOT NULL,
    risk_level TEXT NOT NULL,
    recommendations TEXT NOT NULL DEFAULT '[]',
    updated_at TEXT NOT NULL,
    UNIQUE (tenant_id, document_id, compliance_id, framework_id)
);

CREATE INDEX IF NOT EXISTS idx_compliances_sub_policy ON compliances(sub_policy_id);
CREATE INDEX IF NOT EXISTS idx_audits_framework ON audits(tenant_id, framework_id);
CREATE INDEX IF NOT EXISTS idx_evidence_audit ON evidence_documents(tenant_id, audit_id);
CREATE INDEX IF NOT EXISTS idx_evidence_group ON evidence_documents(audit_id, logical_name, size);
CREATE INDEX IF NOT EXISTS idx_findings_audit ON audit_findings(tenant_id, audit_id);
CREATE INDEX IF NOT EXISTS idx_mappings_document ON cross_framework_mappings(tenant_id, document_id);
";
