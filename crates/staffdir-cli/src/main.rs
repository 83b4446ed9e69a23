use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use staffdir_api::{EmployeesRequest, FlagEmployeeRequest, LoginRequest};
use staffdir_core::{
    AddEmployeeInput, EmployeeFilter, EmployeeSort, PageRequest, SortBy, SortDirection,
    UpdateEmployeeInput,
};

#[derive(Debug, Parser)]
#[command(name = "sdir")]
#[command(about = "Staff directory CLI")]
struct Cli {
    /// Base URL of a running staffdir service.
    #[arg(long, default_value = "http://127.0.0.1:4000")]
    server: String,

    /// Bearer token from `sdir login`; falls back to STAFFDIR_TOKEN.
    #[arg(long)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Verify credentials and print a session token.
    Login(LoginArgs),
    /// Show the session behind the current token.
    Me,
    /// Filter, sort and paginate the directory.
    Employees(EmployeesArgs),
    /// Show one employee by id.
    Employee(IdArgs),
    /// Create one employee record.
    Add(AddArgs),
    /// Apply a partial update to one record.
    Update(UpdateArgs),
    /// Remove one record; prints false for unknown ids.
    Delete(IdArgs),
    /// Set the flagged marker on one record.
    Flag(FlagArgs),
}

#[derive(Debug, Args)]
struct LoginArgs {
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
}

#[derive(Debug, Args)]
struct IdArgs {
    id: String,
}

#[derive(Debug, Args)]
struct EmployeesArgs {
    #[arg(long)]
    name_contains: Option<String>,
    #[arg(long = "class")]
    class_equals: Option<String>,
    #[arg(long)]
    min_age: Option<i64>,
    #[arg(long)]
    max_age: Option<i64>,
    #[arg(long = "subject")]
    subject_in: Option<String>,
    #[arg(long)]
    flagged: Option<bool>,
    /// NAME, AGE, CLASS, ATTENDANCE or UPDATED_AT.
    #[arg(long)]
    sort_by: Option<String>,
    /// ASC or DESC.
    #[arg(long)]
    sort_direction: Option<String>,
    #[arg(long)]
    page: Option<i64>,
    #[arg(long)]
    page_size: Option<i64>,
}

#[derive(Debug, Args)]
struct AddArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    age: i64,
    #[arg(long)]
    class: String,
    #[arg(long = "subject")]
    subjects: Vec<String>,
    #[arg(long)]
    attendance: i64,
}

#[derive(Debug, Args)]
struct UpdateArgs {
    id: String,
    #[arg(long)]
    name: Option<String>,
    #[arg(long)]
    age: Option<i64>,
    #[arg(long)]
    class: Option<String>,
    #[arg(long = "subject")]
    subjects: Option<Vec<String>>,
    #[arg(long)]
    attendance: Option<i64>,
    #[arg(long)]
    flagged: Option<bool>,
}

#[derive(Debug, Args)]
struct FlagArgs {
    id: String,
    #[arg(long, action = clap::ArgAction::Set)]
    flagged: bool,
}

impl Cli {
    fn token(&self) -> Option<String> {
        self.token.clone().or_else(|| std::env::var("STAFFDIR_TOKEN").ok())
    }
}

fn endpoint(server: &str, path: &str) -> String {
    format!("{}{path}", server.trim_end_matches('/'))
}

fn build_employees_request(args: &EmployeesArgs) -> Result<EmployeesRequest> {
    let sort_by = args
        .sort_by
        .as_deref()
        .map(|value| {
            SortBy::parse(value).ok_or_else(|| {
                anyhow!("unknown sort key `{value}`: expected NAME, AGE, CLASS, ATTENDANCE or UPDATED_AT")
            })
        })
        .transpose()?;
    let sort_direction = args
        .sort_direction
        .as_deref()
        .map(|value| {
            SortDirection::parse(value)
                .ok_or_else(|| anyhow!("unknown sort direction `{value}`: expected ASC or DESC"))
        })
        .transpose()?;

    let filter = EmployeeFilter {
        name_contains: args.name_contains.clone(),
        class_equals: args.class_equals.clone(),
        min_age: args.min_age,
        max_age: args.max_age,
        subject_in: args.subject_in.clone(),
        flagged: args.flagged,
    };
    let filter = (filter != EmployeeFilter::default()).then_some(filter);

    let sort = (sort_by.is_some() || sort_direction.is_some())
        .then_some(EmployeeSort { sort_by, sort_direction });

    let pagination = (args.page.is_some() || args.page_size.is_some())
        .then_some(PageRequest { page: args.page, page_size: args.page_size });

    Ok(EmployeesRequest { filter, sort, pagination })
}

fn build_update_input(args: &UpdateArgs) -> UpdateEmployeeInput {
    UpdateEmployeeInput {
        name: args.name.clone(),
        age: args.age,
        class: args.class.clone(),
        subjects: args.subjects.clone(),
        attendance: args.attendance,
        flagged: args.flagged,
    }
}

fn apply_auth(request: ureq::Request, token: Option<&str>) -> ureq::Request {
    match token {
        Some(token) => request.set("Authorization", &format!("Bearer {token}")),
        None => request,
    }
}

fn parse_response(result: std::result::Result<ureq::Response, ureq::Error>) -> Result<Value> {
    match result {
        Ok(response) => response.into_json().context("response body is not JSON"),
        Err(ureq::Error::Status(status, response)) => {
            let body: Value = response.into_json().unwrap_or(Value::Null);
            let kind = body.get("kind").and_then(Value::as_str).unwrap_or("error");
            let message = body.get("error").and_then(Value::as_str).unwrap_or("request failed");
            Err(anyhow!("{kind} ({status}): {message}"))
        }
        Err(err) => Err(err.into()),
    }
}

fn http_get(cli: &Cli, path: &str) -> Result<Value> {
    let request = apply_auth(ureq::get(&endpoint(&cli.server, path)), cli.token().as_deref());
    parse_response(request.call())
}

fn http_post<T>(cli: &Cli, path: &str, body: &T) -> Result<Value>
where
    T: Serialize,
{
    let request = apply_auth(ureq::post(&endpoint(&cli.server, path)), cli.token().as_deref());
    parse_response(request.send_json(body))
}

fn http_post_empty(cli: &Cli, path: &str) -> Result<Value> {
    let request = apply_auth(ureq::post(&endpoint(&cli.server, path)), cli.token().as_deref());
    parse_response(request.call())
}

fn run(cli: &Cli) -> Result<Value> {
    match &cli.command {
        Command::Login(args) => http_post(
            cli,
            "/v1/auth/login",
            &LoginRequest { email: args.email.clone(), password: args.password.clone() },
        ),
        Command::Me => http_get(cli, "/v1/auth/me"),
        Command::Employees(args) => {
            http_post(cli, "/v1/employees/query", &build_employees_request(args)?)
        }
        Command::Employee(args) => http_get(cli, &format!("/v1/employees/{}", args.id)),
        Command::Add(args) => http_post(
            cli,
            "/v1/employees/add",
            &AddEmployeeInput {
                name: args.name.clone(),
                age: args.age,
                class: args.class.clone(),
                subjects: args.subjects.clone(),
                attendance: args.attendance,
            },
        ),
        Command::Update(args) => http_post(
            cli,
            &format!("/v1/employees/{}/update", args.id),
            &build_update_input(args),
        ),
        Command::Delete(args) => http_post_empty(cli, &format!("/v1/employees/{}/delete", args.id)),
        Command::Flag(args) => http_post(
            cli,
            &format!("/v1/employees/{}/flag", args.id),
            &FlagEmployeeRequest { flagged: args.flagged },
        ),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let output = run(&cli)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn employees_args() -> EmployeesArgs {
        EmployeesArgs {
            name_contains: None,
            class_equals: None,
            min_age: None,
            max_age: None,
            subject_in: None,
            flagged: None,
            sort_by: None,
            sort_direction: None,
            page: None,
            page_size: None,
        }
    }

    // Test IDs: TCLI-001
    #[test]
    fn endpoint_joins_without_duplicating_slashes() {
        assert_eq!(endpoint("http://localhost:4000", "/v1/health"), "http://localhost:4000/v1/health");
        assert_eq!(endpoint("http://localhost:4000/", "/v1/health"), "http://localhost:4000/v1/health");
    }

    // Test IDs: TCLI-002
    #[test]
    fn bare_listing_sends_no_filter_sort_or_pagination() -> Result<()> {
        let request = build_employees_request(&employees_args())?;
        assert_eq!(request, EmployeesRequest::default());
        Ok(())
    }

    // Test IDs: TCLI-003
    #[test]
    fn listing_flags_map_onto_the_wire_request() -> Result<()> {
        let mut args = employees_args();
        args.class_equals = Some("A".to_string());
        args.min_age = Some(21);
        args.sort_by = Some("NAME".to_string());
        args.sort_direction = Some("ASC".to_string());
        args.page = Some(2);

        let request = build_employees_request(&args)?;
        let filter = match request.filter {
            Some(filter) => filter,
            None => panic!("filter should be present"),
        };
        assert_eq!(filter.class_equals.as_deref(), Some("A"));
        assert_eq!(filter.min_age, Some(21));

        let sort = match request.sort {
            Some(sort) => sort,
            None => panic!("sort should be present"),
        };
        assert_eq!(sort.sort_by, Some(SortBy::Name));
        assert_eq!(sort.sort_direction, Some(SortDirection::Asc));

        let pagination = match request.pagination {
            Some(pagination) => pagination,
            None => panic!("pagination should be present"),
        };
        assert_eq!(pagination.page, Some(2));
        assert_eq!(pagination.page_size, None);
        Ok(())
    }

    // Test IDs: TCLI-004
    #[test]
    fn unknown_sort_key_is_rejected_client_side() {
        let mut args = employees_args();
        args.sort_by = Some("SALARY".to_string());
        let err = match build_employees_request(&args) {
            Ok(request) => panic!("expected an error, got {request:?}"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("unknown sort key"));
    }

    // Test IDs: TCLI-005
    #[test]
    fn update_args_map_only_present_fields() {
        let args = UpdateArgs {
            id: "emp_x".to_string(),
            name: None,
            age: Some(31),
            class: None,
            subjects: None,
            attendance: None,
            flagged: Some(true),
        };
        let input = build_update_input(&args);
        assert_eq!(input.age, Some(31));
        assert_eq!(input.flagged, Some(true));
        assert_eq!(input.name, None);
        assert_eq!(input.subjects, None);
    }

    // Test IDs: TCLI-006
    #[test]
    fn cli_parses_a_full_add_invocation() {
        let cli = match Cli::try_parse_from([
            "sdir",
            "--token",
            "t0ken",
            "add",
            "--name",
            "Zoe",
            "--age",
            "30",
            "--class",
            "C",
            "--subject",
            "Art",
            "--subject",
            "Design",
            "--attendance",
            "95",
        ]) {
            Ok(cli) => cli,
            Err(err) => panic!("cli should parse: {err}"),
        };

        assert_eq!(cli.token.as_deref(), Some("t0ken"));
        match cli.command {
            Command::Add(args) => {
                assert_eq!(args.name, "Zoe");
                assert_eq!(args.age, 30);
                assert_eq!(args.subjects, vec!["Art".to_string(), "Design".to_string()]);
            }
            other => panic!("expected add command, got {other:?}"),
        }
    }
}
