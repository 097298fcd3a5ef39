use axum::{
    extract::{FromRequest, Multipart, Path, Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Extension, Json, Router,
};
use serde_json::{json, Map, Value};
use taskdesk_core::attachment::{Upload, ATTACHMENT_FIELD};
use taskdesk_core::task::{TaskInput, TaskView};
use taskdesk_core::Envelope;

use super::{api_error, json_object, validation_failed, ApiError, AppState};
use crate::auth::Session;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/tasks", get(list_tasks).post(create_task))
        .route(
            "/api/tasks/{id}",
            get(show_task).put(update_task).delete(delete_task),
        )
        .route("/api/tasks/{id}/preview", get(preview_attachment))
}

/// Task fields plus an optional file, from either a JSON body or a
/// `multipart/form-data` form.
#[derive(Debug, Default)]
pub struct TaskForm {
    pub input: TaskInput,
    pub upload: Option<Upload>,
}

fn multipart_error(e: axum::extract::multipart::MultipartError) -> ApiError {
    (e.status(), Json(json!({ "message": e.body_text() })))
}

impl<S: Send + Sync> FromRequest<S> for TaskForm {
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if !is_multipart {
            let body = json_object(Json::<Map<String, Value>>::from_request(req, state).await)?;
            let input = TaskInput::from_json(&body).map_err(validation_failed)?;
            return Ok(TaskForm { input, upload: None });
        }

        let mut multipart = Multipart::from_request(req, state).await.map_err(|e| {
            (e.status(), Json(json!({ "message": e.body_text() })))
        })?;
        let mut form = TaskForm::default();
        while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
            let name = field.name().unwrap_or_default().to_string();
            let slot = match name.as_str() {
                ATTACHMENT_FIELD => {
                    let filename = field.file_name().map(String::from);
                    let content_type = field.content_type().map(String::from);
                    let data = field.bytes().await.map_err(multipart_error)?;
                    // browsers send an empty part when no file was chosen
                    if data.is_empty() && filename.as_deref().unwrap_or_default().is_empty() {
                        continue;
                    }
                    form.upload = Some(Upload {
                        filename,
                        content_type,
                        data,
                    });
                    continue;
                }
                "title" => &mut form.input.title,
                "description" => &mut form.input.description,
                "status" => &mut form.input.status,
                "deadline" => &mut form.input.deadline,
                _ => continue,
            };
            *slot = Some(field.text().await.map_err(multipart_error)?);
        }
        Ok(form)
    }
}

async fn list_tasks(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Envelope<Vec<TaskView>>>, ApiError> {
    state
        .tasks
        .list(&session.caller)
        .await
        .map(|tasks| Json(Envelope::new("Tasks list", tasks)))
        .map_err(api_error("list_tasks"))
}

async fn create_task(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    form: TaskForm,
) -> Result<(StatusCode, Json<Envelope<TaskView>>), ApiError> {
    state
        .tasks
        .create(&session.caller, &form.input, form.upload)
        .await
        .map(|task| {
            (
                StatusCode::CREATED,
                Json(Envelope::new("Task created successfully", task)),
            )
        })
        .map_err(api_error("create_task"))
}

async fn show_task(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<TaskView>>, ApiError> {
    state
        .tasks
        .show(&session.caller, &id)
        .await
        .map(|task| Json(Envelope::new("Task details", task)))
        .map_err(api_error("show_task"))
}

async fn update_task(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
    form: TaskForm,
) -> Result<Json<Envelope<TaskView>>, ApiError> {
    state
        .tasks
        .update(&session.caller, &id, &form.input, form.upload)
        .await
        .map(|task| Json(Envelope::new("Task updated successfully", task)))
        .map_err(api_error("update_task"))
}

async fn delete_task(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Json<Envelope<()>>, ApiError> {
    state
        .tasks
        .delete(&session.caller, &id)
        .await
        .map(|_| Json(Envelope::message("Task deleted successfully")))
        .map_err(api_error("delete_task"))
}

/// Stream the attachment back inline, after the same ownership checks as `show`.
async fn preview_attachment(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let file = state
        .tasks
        .attachment(&session.caller, &id)
        .await
        .map_err(api_error("preview_attachment"))?;
    let disposition = format!("inline; filename=\"{}\"", file.filename.replace('"', ""));
    Ok((
        [
            (header::CONTENT_TYPE, file.content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        file.data,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::test_helpers::{json_request, register_and_login, test_router};

    const BOUNDARY: &str = "taskdesk-test-boundary";

    fn multipart_body(fields: &[(&str, &str)], file: Option<(&str, &str, &[u8])>) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((filename, content_type, data)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"attachment_url\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn multipart_request(method: &str, uri: &str, token: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("Authorization", format!("Bearer {token}"))
            .header(
                "Content-Type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn get(uri: &str, token: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("Authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    const FIELDS: &[(&str, &str)] = &[
        ("title", "T1"),
        ("status", "pending"),
        ("deadline", "2025-01-01"),
    ];

    #[tokio::test]
    async fn json_create_then_list_and_show() {
        let app = test_router().await;
        let token = register_and_login(&app, "a@x.com").await;

        let resp = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/tasks",
                Some(&token),
                json!({ "title": "T1", "status": "pending", "deadline": "2025-01-01" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let body = body_json(resp).await;
        assert_eq!(body["message"], "Task created successfully");
        assert!(body["data"]["attachment_url"].is_null());
        let id = body["data"]["id"].as_str().unwrap().to_string();

        let resp = app.clone().oneshot(get("/api/tasks", &token)).await.unwrap();
        let body = body_json(resp).await;
        assert_eq!(body["message"], "Tasks list");
        assert_eq!(body["data"].as_array().unwrap().len(), 1);

        let resp = app
            .clone()
            .oneshot(get(&format!("/api/tasks/{id}"), &token))
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["message"], "Task details");

        let resp = app
            .oneshot(get(&format!("/api/tasks/{id}/preview"), &token))
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
        assert_eq!(body_json(resp).await["message"], "Attachment not found");
    }

    #[tokio::test]
    async fn wrong_typed_json_fields_are_field_errors() {
        let app = test_router().await;
        let token = register_and_login(&app, "a@x.com").await;

        let resp = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/tasks",
                Some(&token),
                json!({ "title": 123, "status": "pending", "deadline": "2025-01-01" }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), 422);
        let body = body_json(resp).await;
        assert_eq!(body["message"], "The title field must be a string.");
        assert_eq!(body["errors"]["title"][0], "The title field must be a string.");

        // validation still runs before the task lookup on update
        let resp = app
            .clone()
            .oneshot(json_request(
                "PUT",
                "/api/tasks/no-such-task",
                Some(&token),
                json!({ "title": "T", "status": ["pending"], "deadline": 20250101 }),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), 422);
        let body = body_json(resp).await;
        assert_eq!(body["errors"]["status"][0], "The selected status is invalid.");
        assert_eq!(body["errors"]["deadline"][0], "The deadline field must be a valid date.");

        // a body that is not JSON at all keeps the plain envelope
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/tasks")
                    .header("Authorization", format!("Bearer {token}"))
                    .header("Content-Type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body = body_json(resp).await;
        assert!(body["message"].is_string());
        assert!(body.get("errors").is_none());
    }

    #[tokio::test]
    async fn multipart_create_and_preview() {
        let app = test_router().await;
        let token = register_and_login(&app, "a@x.com").await;
        let pdf: &[u8] = b"%PDF-1.4\nhello preview";

        let resp = app
            .clone()
            .oneshot(multipart_request(
                "POST",
                "/api/tasks",
                &token,
                multipart_body(FIELDS, Some(("report.pdf", "application/pdf", pdf))),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        let body = body_json(resp).await;
        let id = body["data"]["id"].as_str().unwrap().to_string();
        let url = body["data"]["attachment_url"].as_str().unwrap();
        assert!(url.ends_with(&format!("/api/tasks/{id}/preview")));

        let resp = app
            .oneshot(get(&format!("/api/tasks/{id}/preview"), &token))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["content-type"], "application/pdf");
        assert!(resp.headers()["content-disposition"]
            .to_str()
            .unwrap()
            .starts_with("inline"));
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(bytes.as_ref(), pdf);
    }

    #[tokio::test]
    async fn oversize_or_non_pdf_upload_is_422() {
        let app = test_router().await;
        let token = register_and_login(&app, "a@x.com").await;

        let mut big = b"%PDF-1.4\n".to_vec();
        big.resize(6 * 1024 * 1024, b'x');
        let resp = app
            .clone()
            .oneshot(multipart_request(
                "POST",
                "/api/tasks",
                &token,
                multipart_body(FIELDS, Some(("big.pdf", "application/pdf", big.as_slice()))),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), 422);
        let body = body_json(resp).await;
        assert_eq!(
            body["errors"]["attachment_url"][0],
            "The attachment url field must not be greater than 5120 kilobytes."
        );

        let resp = app
            .clone()
            .oneshot(multipart_request(
                "POST",
                "/api/tasks",
                &token,
                multipart_body(FIELDS, Some(("notes.txt", "text/plain", &b"hello"[..]))),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), 422);
        assert_eq!(
            body_json(resp).await["errors"]["attachment_url"][0],
            "The attachment url field must be a file of type: pdf."
        );

        let resp = app.oneshot(get("/api/tasks", &token)).await.unwrap();
        assert!(body_json(resp).await["data"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_file_part_means_no_attachment() {
        let app = test_router().await;
        let token = register_and_login(&app, "a@x.com").await;
        let resp = app
            .oneshot(multipart_request(
                "POST",
                "/api/tasks",
                &token,
                multipart_body(FIELDS, Some(("", "application/octet-stream", &b""[..]))),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
        assert!(body_json(resp).await["data"]["attachment_url"].is_null());
    }

    #[tokio::test]
    async fn other_users_task_is_403_and_missing_is_404() {
        let app = test_router().await;
        let alice = register_and_login(&app, "alice@x.com").await;
        let bob = register_and_login(&app, "bob@x.com").await;

        let resp = app
            .clone()
            .oneshot(json_request(
                "POST",
                "/api/tasks",
                Some(&alice),
                json!({ "title": "mine", "status": "pending", "deadline": "2025-01-01" }),
            ))
            .await
            .unwrap();
        let id = body_json(resp).await["data"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let update = json!({ "title": "x", "status": "completed", "deadline": "2025-01-02" });
        let requests = |token: &str, id: &str| {
            vec![
                get(&format!("/api/tasks/{id}"), token),
                json_request("PUT", &format!("/api/tasks/{id}"), Some(token), update.clone()),
                json_request("DELETE", &format!("/api/tasks/{id}"), Some(token), json!({})),
                get(&format!("/api/tasks/{id}/preview"), token),
            ]
        };

        for req in requests(&bob, &id) {
            let resp = app.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), 403);
            assert_eq!(body_json(resp).await["message"], "Unauthorized");
        }
        for req in requests(&alice, "no-such-task") {
            let resp = app.clone().oneshot(req).await.unwrap();
            assert_eq!(resp.status(), 404);
            assert_eq!(body_json(resp).await["message"], "Task not found");
        }
    }

    #[tokio::test]
    async fn update_then_delete() {
        let app = test_router().await;
        let token = register_and_login(&app, "a@x.com").await;

        let resp = app
            .clone()
            .oneshot(multipart_request(
                "POST",
                "/api/tasks",
                &token,
                multipart_body(FIELDS, None),
            ))
            .await
            .unwrap();
        let id = body_json(resp).await["data"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let resp = app
            .clone()
            .oneshot(multipart_request(
                "PUT",
                &format!("/api/tasks/{id}"),
                &token,
                multipart_body(
                    &[("title", "T2"), ("status", "in_progress"), ("deadline", "2025-03-01")],
                    Some(("new.pdf", "application/pdf", &b"%PDF-1.7\nnew"[..])),
                ),
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body = body_json(resp).await;
        assert_eq!(body["message"], "Task updated successfully");
        assert_eq!(body["data"]["title"], "T2");
        assert_eq!(body["data"]["status"], "in_progress");
        assert!(body["data"]["attachment_url"].is_string());

        let resp = app
            .clone()
            .oneshot(json_request("DELETE", &format!("/api/tasks/{id}"), Some(&token), json!({})))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(body_json(resp).await["message"], "Task deleted successfully");

        let resp = app
            .oneshot(get(&format!("/api/tasks/{id}"), &token))
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }
}
