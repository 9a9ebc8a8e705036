use easycalc::output::SinkOutput;
use easycalc::{run_project, EasyCalcError, ProjectFlags};
use lambda_http::{run, service_fn, tracing, Body, Error, Request, RequestExt, Response};
use serde_json::json;
use uuid::Uuid;

async fn function_handler(event: Request) -> Result<Response<Body>, Error> {
    let input = match event.body() {
        Body::Empty => &[][..],
        Body::Text(text) => text.as_bytes(),
        Body::Binary(bytes) => bytes.as_slice(),
    };

    // ?encoded means the body is an input code rather than a JSON record
    let mut flags = ProjectFlags::empty();
    if event
        .query_string_parameters_ref()
        .and_then(|params| params.first("encoded"))
        .is_some()
    {
        flags |= ProjectFlags::ENCODED_INPUT;
    }

    let resp = match run_project(input, SinkOutput, &flags) {
        Ok(record) => Response::builder()
            .status(200)
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_string(&record)?))
            .map_err(Box::new)?,
        Err(e) => Response::builder()
            .status(status_for(&e))
            .header("Content-Type", "application/json")
            .body(Body::from(serde_json::to_string(&json!({"errors": [{"id": Uuid::new_v4(), "status": status_for(&e).to_string(), "detail": e.to_string()}]}))?))
            .map_err(Box::new)?,
    };

    Ok(resp)
}

fn status_for(error: &EasyCalcError) -> u16 {
    match error {
        EasyCalcError::ErrorInPostprocessing(_) => 500,
        _ => 422,
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::init_default_subscriber();

    run(service_fn(function_handler)).await
}
