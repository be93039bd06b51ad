//! Typed records and their schema descriptors
//!
//! One `*Record` struct per workbook type plus a unit `*Schema` descriptor that
//! carries the header variants, required fields and record constructor.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::decode::DecodedRow;
use super::kind::ImportKind;
use super::schema::{FieldSpec, ImportRecord, ImportStamp, Schema, composite_key, fold_key};

// ============================================================================
// Identity-group memberships
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityGroupRecord {
    pub group: Option<String>,
    pub account: Option<String>,
    pub application: Option<String>,
    pub suite: Option<String>,
    pub environment: Option<String>,
    pub critical: Option<bool>,
    pub import_date: DateTime<Utc>,
    pub import_set: String,
}

impl ImportRecord for IdentityGroupRecord {
    const KIND: ImportKind = ImportKind::IdentityGroup;

    fn natural_key(&self) -> Option<String> {
        match (&self.group, &self.account) {
            (Some(group), Some(account)) => Some(composite_key(&[group.as_str(), account.as_str()])),
            _ => None,
        }
    }

    fn import_date(&self) -> DateTime<Utc> {
        self.import_date
    }

    fn import_set(&self) -> &str {
        &self.import_set
    }
}

pub struct IdentityGroupSchema;

impl Schema for IdentityGroupSchema {
    type Record = IdentityGroupRecord;

    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::text(
            "group",
            "group name",
            &["group", "groupname", "adgroup", "securitygroup", "entitlement", "entitlementgroup"],
        )
        .required("group name is required"),
        FieldSpec::text(
            "account",
            "system account",
            &[
                "account",
                "systemaccount",
                "accountname",
                "samaccountname",
                "userid",
                "username",
                "user",
                "login",
            ],
        )
        .required("system account is required"),
        FieldSpec::text("application", "application name", &["app", "application", "applicationname", "appname"]),
        FieldSpec::text("suite", "application suite", &["suite", "applicationsuite", "appsuite"]),
        FieldSpec::text("environment", "environment", &["otap", "environment", "env", "dtap", "environmenttag"]),
        FieldSpec::flag(
            "critical",
            "critical flag",
            &["critical", "criticality", "iscritical", "businesscritical"],
        ),
    ];

    const PRIMARY_FIELD: &'static str = "group";

    fn build(row: &DecodedRow, stamp: &ImportStamp) -> IdentityGroupRecord {
        IdentityGroupRecord {
            group: row.text("group"),
            account: row.text("account"),
            application: row.text("application"),
            suite: row.text("suite"),
            environment: row.text("environment"),
            critical: row.flag("critical"),
            import_date: stamp.imported_at,
            import_set: stamp.import_set.clone(),
        }
    }
}

// ============================================================================
// Personnel
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonnelRecord {
    pub account: Option<String>,
    pub department: Option<String>,
    pub simple_department: Option<String>,
    pub job_role: Option<String>,
    pub division: Option<String>,
    pub leave_date: Option<NaiveDate>,
    pub employee_number: Option<String>,
    pub import_date: DateTime<Utc>,
    pub import_set: String,
}

impl ImportRecord for PersonnelRecord {
    const KIND: ImportKind = ImportKind::Personnel;

    fn natural_key(&self) -> Option<String> {
        self.account.clone()
    }

    fn import_date(&self) -> DateTime<Utc> {
        self.import_date
    }

    fn import_set(&self) -> &str {
        &self.import_set
    }
}

pub struct PersonnelSchema;

impl Schema for PersonnelSchema {
    type Record = PersonnelRecord;

    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::text(
            "account",
            "account",
            &[
                "account",
                "systemaccount",
                "accountname",
                "samaccountname",
                "userid",
                "username",
                "user",
                "login",
            ],
        )
        .required("account is required"),
        FieldSpec::text("department", "department", &["department", "dept", "departmentname"]),
        FieldSpec::text(
            "simple_department",
            "simple department",
            &["simpledepartment", "simpledept", "departmentsimple", "shortdepartment"],
        ),
        FieldSpec::text("job_role", "job role", &["jobrole", "role", "jobtitle", "function", "position"]),
        FieldSpec::text("division", "division", &["division", "directorate", "businessunit"]),
        FieldSpec::date(
            "leave_date",
            "leave date",
            &["leavedate", "leavingdate", "enddate", "exitdate", "leaverdate"],
        ),
        FieldSpec::text(
            "employee_number",
            "employee number",
            &["employeenumber", "employeeno", "employeeid", "staffnumber", "personnelnumber", "empno"],
        ),
    ];

    const PRIMARY_FIELD: &'static str = "account";

    fn build(row: &DecodedRow, stamp: &ImportStamp) -> PersonnelRecord {
        PersonnelRecord {
            account: row.text("account"),
            department: row.text("department"),
            simple_department: row.text("simple_department"),
            job_role: row.text("job_role"),
            division: row.text("division"),
            leave_date: row.date("leave_date"),
            employee_number: row.text("employee_number"),
            import_date: stamp.imported_at,
            import_set: stamp.import_set.clone(),
        }
    }
}

// ============================================================================
// Application-keyed schemas
// ============================================================================

const APPLICATION_VARIANTS: &[&str] = &["application", "applicationname", "app", "appname"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackagingRecord {
    pub application: Option<String>,
    pub package_status: Option<String>,
    pub readiness_date: Option<NaiveDate>,
    pub import_date: DateTime<Utc>,
    pub import_set: String,
}

impl ImportRecord for PackagingRecord {
    const KIND: ImportKind = ImportKind::Packaging;

    fn natural_key(&self) -> Option<String> {
        self.application.as_deref().map(fold_key)
    }

    fn import_date(&self) -> DateTime<Utc> {
        self.import_date
    }

    fn import_set(&self) -> &str {
        &self.import_set
    }
}

pub struct PackagingSchema;

impl Schema for PackagingSchema {
    type Record = PackagingRecord;

    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::text(
            "application",
            "application name",
            &["application", "applicationname", "app", "appname", "package", "packagename"],
        )
        .required("application name is required"),
        FieldSpec::text("package_status", "package status", &["packagestatus", "packagingstatus", "status"]).known(&[
            "not started",
            "in progress",
            "packaged",
            "ready",
            "ready for testing",
            "complete",
            "completed",
            "on hold",
            "blocked",
            "failed",
            "not required",
            "retired",
        ]),
        FieldSpec::date(
            "readiness_date",
            "readiness date",
            &["readinessdate", "readydate", "packagereadydate", "targetdate", "date"],
        ),
    ];

    const PRIMARY_FIELD: &'static str = "application";

    fn build(row: &DecodedRow, stamp: &ImportStamp) -> PackagingRecord {
        PackagingRecord {
            application: row.text("application"),
            package_status: row.text("package_status"),
            readiness_date: row.date("readiness_date"),
            import_date: stamp.imported_at,
            import_set: stamp.import_set.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestingRecord {
    pub application: Option<String>,
    pub test_status: Option<String>,
    pub test_date: Option<NaiveDate>,
    pub test_result: Option<String>,
    pub comments: Option<String>,
    pub planned_test_date: Option<NaiveDate>,
    pub import_date: DateTime<Utc>,
    pub import_set: String,
}

impl ImportRecord for TestingRecord {
    const KIND: ImportKind = ImportKind::Testing;

    /// Keyed on the application name as written; "CRM" and "crm" are distinct
    fn natural_key(&self) -> Option<String> {
        self.application.clone()
    }

    fn import_date(&self) -> DateTime<Utc> {
        self.import_date
    }

    fn import_set(&self) -> &str {
        &self.import_set
    }
}

pub struct TestingSchema;

impl Schema for TestingSchema {
    type Record = TestingRecord;

    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::text("application", "application name", APPLICATION_VARIANTS)
            .required("application name is required"),
        FieldSpec::text("test_status", "test status", &["teststatus", "testingstatus", "status"]).known(&[
            "not started",
            "scheduled",
            "in progress",
            "complete",
            "completed",
            "passed",
            "failed",
            "blocked",
            "on hold",
            "not required",
        ]),
        FieldSpec::strict_date(
            "test_date",
            "test date",
            &["testdate", "datetested", "testeddate", "testcompleteddate"],
        ),
        FieldSpec::text("test_result", "test result", &["testresult", "result", "outcome"]).known(&[
            "pass",
            "passed",
            "fail",
            "failed",
            "pass with issues",
            "partial",
            "inconclusive",
        ]),
        FieldSpec::text("comments", "comments", &["comments", "comment", "notes", "remarks"]),
        FieldSpec::date(
            "planned_test_date",
            "planned test date",
            &["plannedtestdate", "plannedtest", "plannedtestingdate", "testplanneddate", "scheduleddate"],
        ),
    ];

    const PRIMARY_FIELD: &'static str = "application";

    fn build(row: &DecodedRow, stamp: &ImportStamp) -> TestingRecord {
        TestingRecord {
            application: row.text("application"),
            test_status: row.text("test_status"),
            test_date: row.date("test_date"),
            test_result: row.text("test_result"),
            comments: row.text("comments"),
            planned_test_date: row.date("planned_test_date"),
            import_date: stamp.imported_at,
            import_set: stamp.import_set.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationRecord {
    pub application: Option<String>,
    pub replacement_application: Option<String>,
    pub new_suite: Option<String>,
    /// Whether the application is the successor ("will be") of another
    pub will_be: Option<bool>,
    pub division_scope: Option<String>,
    pub target_platform: Option<String>,
    pub readiness: Option<String>,
    pub import_date: DateTime<Utc>,
    pub import_set: String,
}

impl ImportRecord for MigrationRecord {
    const KIND: ImportKind = ImportKind::Migration;

    fn natural_key(&self) -> Option<String> {
        self.application.as_deref().map(fold_key)
    }

    fn import_date(&self) -> DateTime<Utc> {
        self.import_date
    }

    fn import_set(&self) -> &str {
        &self.import_set
    }
}

pub struct MigrationSchema;

impl Schema for MigrationSchema {
    type Record = MigrationRecord;

    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::text("application", "application name", APPLICATION_VARIANTS)
            .required("application name is required"),
        FieldSpec::text(
            "replacement_application",
            "replacement application",
            &["replacementapplication", "replacementapp", "replacement", "replacedby", "newapplication"],
        ),
        FieldSpec::text("new_suite", "new suite", &["newsuite", "newapplicationsuite", "targetsuite"]),
        FieldSpec::flag("will_be", "will-be flag", &["willbe", "successor", "willbereplaced", "issuccessor"]),
        FieldSpec::text(
            "division_scope",
            "division scope",
            &["division", "inscope", "outofscope", "scope", "divisionscope", "inoutofscope"],
        )
        .known(&["in scope", "out of scope", "in", "out"]),
        FieldSpec::text(
            "target_platform",
            "target platform",
            &["targetplatform", "platform", "target", "deliverymethod"],
        ),
        FieldSpec::text(
            "readiness",
            "readiness",
            &["readiness", "readinesstag", "ready", "migrationreadiness"],
        ),
    ];

    const PRIMARY_FIELD: &'static str = "application";

    fn build(row: &DecodedRow, stamp: &ImportStamp) -> MigrationRecord {
        MigrationRecord {
            application: row.text("application"),
            replacement_application: row.text("replacement_application"),
            new_suite: row.text("new_suite"),
            will_be: row.flag("will_be"),
            division_scope: row.text("division_scope"),
            target_platform: row.text("target_platform"),
            readiness: row.text("readiness"),
            import_date: stamp.imported_at,
            import_set: stamp.import_set.clone(),
        }
    }
}

// ============================================================================
// Organizational clusters
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterRecord {
    pub department: Option<String>,
    pub simple_department: Option<String>,
    pub domain: Option<String>,
    pub cluster_id: Option<String>,
    pub cluster_readiness: Option<String>,
    pub import_date: DateTime<Utc>,
    pub import_set: String,
}

impl ImportRecord for ClusterRecord {
    const KIND: ImportKind = ImportKind::Cluster;

    /// Every cluster row is kept
    fn natural_key(&self) -> Option<String> {
        None
    }

    fn import_date(&self) -> DateTime<Utc> {
        self.import_date
    }

    fn import_set(&self) -> &str {
        &self.import_set
    }
}

pub struct ClusterSchema;

impl Schema for ClusterSchema {
    type Record = ClusterRecord;

    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::text("department", "department", &["department", "dept", "departmentname"])
            .required("department is required"),
        FieldSpec::text(
            "simple_department",
            "simple department",
            &["simpledepartment", "simpledept", "departmentsimple", "shortdepartment"],
        ),
        FieldSpec::text("domain", "domain", &["domain", "businessdomain"]),
        FieldSpec::text("cluster_id", "cluster id", &["cluster", "clusterid", "clusternumber", "clusterno"]),
        FieldSpec::text(
            "cluster_readiness",
            "cluster readiness",
            &["clusterreadiness", "readiness", "clusterready"],
        ),
    ];

    const PRIMARY_FIELD: &'static str = "department";

    fn build(row: &DecodedRow, stamp: &ImportStamp) -> ClusterRecord {
        ClusterRecord {
            department: row.text("department"),
            simple_department: row.text("simple_department"),
            domain: row.text("domain"),
            cluster_id: row.text("cluster_id"),
            cluster_readiness: row.text("cluster_readiness"),
            import_date: stamp.imported_at,
            import_set: stamp.import_set.clone(),
        }
    }
}
