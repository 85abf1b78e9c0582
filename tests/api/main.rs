mod health_check;
mod postgres_store;
