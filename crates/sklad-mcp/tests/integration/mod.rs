mod bridge;
mod middleware;
mod mounting;
mod resolution;
mod tasks;
mod transforms;
