use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum EventVotes {
    Table,
    EventId,
    VoteType,
}

#[derive(DeriveIden)]
enum CommentVotes {
    Table,
    CommentId,
    VoteType,
}

#[derive(DeriveIden)]
enum Rsvps {
    Table,
    EventId,
    Status,
}

#[derive(DeriveIden)]
enum Record {
    Id,
    UserId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Events {
    Table,
    Id,
}

#[derive(DeriveIden)]
enum Comments {
    Table,
    Id,
}

/// One reaction table: at most one record per (target, user).
struct ReactionTableDef {
    table: DynIden,
    target: DynIden,
    kind: DynIden,
    target_table: DynIden,
    target_key: DynIden,
    name: &'static str,
}

impl ReactionTableDef {
    fn create(&self) -> TableCreateStatement {
        Table::create()
            .table(self.table.clone())
            .if_not_exists()
            .col(ColumnDef::new(Record::Id).uuid().not_null().primary_key())
            .col(ColumnDef::new(self.target.clone()).uuid().not_null())
            .col(ColumnDef::new(Record::UserId).uuid().not_null())
            .col(ColumnDef::new(self.kind.clone()).string_len(20).not_null())
            .col(
                ColumnDef::new(Record::CreatedAt)
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .col(
                ColumnDef::new(Record::UpdatedAt)
                    .timestamp_with_time_zone()
                    .null(),
            )
            .foreign_key(
                ForeignKey::create()
                    .name(format!("fk_{}_target", self.name))
                    .from(self.table.clone(), self.target.clone())
                    .to(self.target_table.clone(), self.target_key.clone())
                    .on_delete(ForeignKeyAction::Cascade),
            )
            .to_owned()
    }

    fn unique_voter(&self) -> IndexCreateStatement {
        Index::create()
            .name(format!("idx_{}_unique_voter", self.name))
            .table(self.table.clone())
            .col(self.target.clone())
            .col(Record::UserId)
            .unique()
            .if_not_exists()
            .to_owned()
    }

    fn by_kind(&self) -> IndexCreateStatement {
        Index::create()
            .name(format!("idx_{}_target_kind", self.name))
            .table(self.table.clone())
            .col(self.target.clone())
            .col(self.kind.clone())
            .if_not_exists()
            .to_owned()
    }
}

fn tables() -> [ReactionTableDef; 3] {
    [
        ReactionTableDef {
            table: EventVotes::Table.into_iden(),
            target: EventVotes::EventId.into_iden(),
            kind: EventVotes::VoteType.into_iden(),
            target_table: Events::Table.into_iden(),
            target_key: Events::Id.into_iden(),
            name: "event_votes",
        },
        ReactionTableDef {
            table: CommentVotes::Table.into_iden(),
            target: CommentVotes::CommentId.into_iden(),
            kind: CommentVotes::VoteType.into_iden(),
            target_table: Comments::Table.into_iden(),
            target_key: Comments::Id.into_iden(),
            name: "comment_votes",
        },
        ReactionTableDef {
            table: Rsvps::Table.into_iden(),
            target: Rsvps::EventId.into_iden(),
            kind: Rsvps::Status.into_iden(),
            target_table: Events::Table.into_iden(),
            target_key: Events::Id.into_iden(),
            name: "rsvps",
        },
    ]
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for def in tables() {
            manager.create_table(def.create()).await?;
            manager.create_index(def.unique_voter()).await?;
            manager.create_index(def.by_kind()).await?;
        }
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        for def in tables().into_iter().rev() {
            manager
                .drop_table(Table::drop().table(def.table).to_owned())
                .await?;
        }
        Ok(())
    }
}
