use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use storeguard_datastore::{
    Datastore, DatastoreError, DatastoreResult, FromSql, HealthReport, PgPool, Row,
};

const LIST_TODOS: &str = "SELECT id, task, completed FROM todos ORDER BY id";
const INSERT_TODO: &str = "INSERT INTO todos (task) VALUES ($1) RETURNING id, completed";
const UPDATE_TODO: &str = "UPDATE todos SET completed = $1 WHERE id = $2";
const DELETE_TODO: &str = "DELETE FROM todos WHERE id = $1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: i32,
    pub task: String,
    pub completed: bool,
}

impl Todo {
    fn from_row(row: &Row) -> Result<Self, DatastoreError> {
        Ok(Self {
            id: column(row, "id")?,
            task: column(row, "task")?,
            completed: column(row, "completed")?,
        })
    }
}

fn column<'a, T: FromSql<'a>>(row: &'a Row, name: &str) -> Result<T, DatastoreError> {
    row.try_get(name)
        .map_err(|e| DatastoreError::Query(format!("column {name}: {e}")))
}

/// What the handlers need from storage. Every call is already guarded by
/// the breaker and retry policy.
pub trait TodoStore: Send + Sync + 'static {
    fn list(&self) -> BoxFuture<'_, DatastoreResult<Vec<Todo>>>;

    fn add(&self, task: String) -> BoxFuture<'_, DatastoreResult<Todo>>;

    /// Updating an id that does not exist is not an error.
    fn set_completed(&self, id: i32, completed: bool) -> BoxFuture<'_, DatastoreResult<()>>;

    /// Deleting an id that does not exist is not an error.
    fn delete(&self, id: i32) -> BoxFuture<'_, DatastoreResult<()>>;

    fn health(&self) -> BoxFuture<'_, HealthReport>;
}

/// Todos in the `todos` table. Lists go to the read pool.
#[derive(Debug, Clone)]
pub struct PgTodoStore {
    datastore: Datastore<PgPool>,
}

impl PgTodoStore {
    pub fn new(datastore: Datastore<PgPool>) -> Self {
        Self { datastore }
    }
}

impl TodoStore for PgTodoStore {
    fn list(&self) -> BoxFuture<'_, DatastoreResult<Vec<Todo>>> {
        Box::pin(self.datastore.execute_read(|pool| async move {
            let rows = pool.query(LIST_TODOS, &[]).await?;
            rows.iter().map(Todo::from_row).collect::<Result<Vec<_>, _>>()
        }))
    }

    fn add(&self, task: String) -> BoxFuture<'_, DatastoreResult<Todo>> {
        Box::pin(self.datastore.execute_write(move |pool| {
            let task = task.clone();
            async move {
                let row = pool.query_one(INSERT_TODO, &[&task]).await?;
                Ok(Todo {
                    id: column(&row, "id")?,
                    completed: column(&row, "completed")?,
                    task,
                })
            }
        }))
    }

    fn set_completed(&self, id: i32, completed: bool) -> BoxFuture<'_, DatastoreResult<()>> {
        Box::pin(self.datastore.execute_write(move |pool| async move {
            pool.execute(UPDATE_TODO, &[&completed, &id]).await?;
            Ok(())
        }))
    }

    fn delete(&self, id: i32) -> BoxFuture<'_, DatastoreResult<()>> {
        Box::pin(self.datastore.execute_write(move |pool| async move {
            pool.execute(DELETE_TODO, &[&id]).await?;
            Ok(())
        }))
    }

    fn health(&self) -> BoxFuture<'_, HealthReport> {
        Box::pin(self.datastore.health())
    }
}
