//! Routes recovered from CDK stack source, served in-memory.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use lambda_gateway::invocation::{HandlerRegistry, InvocationContext};
use lambda_gateway::lifecycle::Gateway;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;

const STACK: &str = r#"
import * as cdk from 'aws-cdk-lib';
import { HttpApi, HttpMethod } from 'aws-cdk-lib/aws-apigatewayv2';
import { HttpLambdaIntegration } from 'aws-cdk-lib/aws-apigatewayv2-integrations';

function lambdaEnvironment(config: StackConfig): Record<string, string> {
  return {
    TABLE_NAME: config.tableName,
    STAGE: 'local',
  };
}

export class ApiStack extends cdk.Stack {
  constructor(scope: Construct, id: string, config: StackConfig) {
    super(scope, id);
    const api = new HttpApi(this, 'Api');

    const listFn = createLambda(this, 'ListItems', 'items.list');
    const createFn = createLambda(this, 'CreateItem', 'items.create');
    // const unusedFn = createLambda(this, 'Unused', 'unused.handler');
    const orphanFn = createLambda(this, 'Orphan', 'orphan.handler');

    api.addRoutes({
      path: '/items',
      methods: [HttpMethod.GET],
      integration: new HttpLambdaIntegration('ListIntegration', listFn),
    });
    api.addRoutes({
      path: '/items',
      methods: [HttpMethod.POST, HttpMethod.PUT],
      integration: new HttpLambdaIntegration('CreateIntegration', createFn),
    });
  }
}

function createLambda(scope: Construct, id: string, handler: string) {
  return new lambda.Function(scope, id, {
    runtime: lambda.Runtime.NODEJS_20_X,
    code: lambda.Code.fromAsset('dist'),
    handler,
    environment: lambdaEnvironment(config),
  });
}
"#;

fn registry() -> HandlerRegistry {
    let reply = |name: &'static str| {
        move |event: Value, ctx: InvocationContext| async move {
            Ok(json!({
                "statusCode": 200,
                "body": json!({
                    "handler": name,
                    "method": event["requestContext"]["http"]["method"],
                    "table": ctx.environment.get("TABLE_NAME"),
                })
                .to_string(),
            }))
        }
    };
    HandlerRegistry::new()
        .with("items.list", reply("items.list"))
        .with("items.create", reply("items.create"))
}

fn gateway() -> (Gateway, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let stack = common::write_file(dir.path(), "lib/api-stack.ts", STACK);
    let env_file = common::write_file(dir.path(), "env.json", r#"{"Shared": {"tableName": "items-local"}}"#);

    let mut config = common::config(stack, dir.path());
    config.handlers.env_file = Some(env_file);
    config.handlers.env_builder = Some("lambdaEnvironment".into());

    let gateway = Gateway::bootstrap_with(&config, Arc::new(registry())).unwrap();
    (gateway, dir)
}

async fn call(gateway: &Gateway, method: &str, path: &str) -> (StatusCode, String) {
    let request = Request::builder().method(method).uri(path).body(Body::empty()).unwrap();
    let response = gateway.server.router().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

#[test]
fn test_only_registered_bindings_become_routes() {
    let (gateway, _dir) = gateway();
    let mut routes: Vec<String> = gateway
        .server
        .routes()
        .endpoints()
        .map(|e| e.to_string())
        .collect();
    routes.sort();
    assert_eq!(
        routes,
        vec![
            "Endpoint(dist, items.create, /items, post)",
            "Endpoint(dist, items.create, /items, put)",
            "Endpoint(dist, items.list, /items, get)",
        ]
    );
}

#[tokio::test]
async fn test_methods_dispatch_to_their_handlers() {
    let (gateway, _dir) = gateway();

    let (status, body) = call(&gateway, "GET", "/items").await;
    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body, json!({"handler": "items.list", "method": "GET", "table": "items-local"}));

    let (status, body) = call(&gateway, "PUT", "/items").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap()["handler"], "items.create");

    let (status, _) = call(&gateway, "DELETE", "/items").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
