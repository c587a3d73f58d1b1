mod helpers;

mod notification_test;
mod router_test;
mod workflow_test;
