//! ユーザー管理ユースケース
//!
//! 自己登録・承認・ロール変更・通知設定の更新と、管理者によるカスタムメール送信を実装する。
//! 通知はプロファイルの保存をコミットしてから送る。

use std::sync::Arc;

use ticketdesk_domain::{
    clock::Clock,
    notification::{NotificationEvent, NotificationPayload},
    tenant::TenantId,
    user::{
        Email,
        NewUserProfile,
        NotificationPreferences,
        UserId,
        UserName,
        UserProfile,
        UserRole,
        UserStatus,
    },
};
use ticketdesk_infra::{
    db::TransactionManager,
    repository::{OrganizationRepository, UserProfileRepository},
};
use ticketdesk_shared::{
    event_log::{error as log_error, event},
    log_business_event,
};

use crate::{
    error::CoreError,
    usecase::{
        helpers::{FindResultExt, begin_tx, commit_tx},
        notification::{CustomEmailReport, Mailer, NotificationDispatcher, recipient},
    },
};

/// 従業員の自己登録の入力
#[derive(Debug, Clone)]
pub struct RegisterEmployeeInput {
    pub tenant_id:  TenantId,
    pub email:      String,
    pub name:       String,
    pub department: Option<String>,
}

/// ユーザー承認の入力
#[derive(Debug, Clone)]
pub struct ApproveUserInput {
    pub tenant_id: TenantId,
    pub user_id:   UserId,
    pub actor_id:  UserId,
}

/// ロール・部署変更の入力
#[derive(Debug, Clone)]
pub struct UpdateUserProfileInput {
    pub tenant_id:  TenantId,
    pub user_id:    UserId,
    pub actor_id:   UserId,
    pub role:       UserRole,
    pub department: Option<String>,
}

/// カスタムメール送信の入力
#[derive(Debug, Clone)]
pub struct SendCustomEmailInput {
    pub tenant_id:     TenantId,
    pub actor_id:      UserId,
    pub recipient_ids: Vec<UserId>,
    pub subject:       String,
    /// プレーンテキストまたは HTML
    pub body:          String,
}

/// ユーザー管理ユースケース
pub struct UserUseCaseImpl {
    profile_repo:      Arc<dyn UserProfileRepository>,
    organization_repo: Arc<dyn OrganizationRepository>,
    tx_manager:        Arc<dyn TransactionManager>,
    clock:             Arc<dyn Clock>,
    dispatcher:        Arc<NotificationDispatcher>,
    mailer:            Arc<Mailer>,
}

impl UserUseCaseImpl {
    pub fn new(
        profile_repo: Arc<dyn UserProfileRepository>,
        organization_repo: Arc<dyn OrganizationRepository>,
        tx_manager: Arc<dyn TransactionManager>,
        clock: Arc<dyn Clock>,
        dispatcher: Arc<NotificationDispatcher>,
        mailer: Arc<Mailer>,
    ) -> Self {
        Self {
            profile_repo,
            organization_repo,
            tx_manager,
            clock,
            dispatcher,
            mailer,
        }
    }

    /// 従業員として自己登録する
    ///
    /// 1. 組織の存在確認
    /// 2. 承認待ちのプロファイルを作成して保存
    /// 3. 組織の管理者全員に `NewUserPending` を通知
    ///
    /// 管理者の一覧を取得できなかった場合も登録は成功とする。
    pub async fn register_employee(
        &self,
        input: RegisterEmployeeInput,
    ) -> Result<UserProfile, CoreError> {
        let organization = self
            .organization_repo
            .find_by_id(&input.tenant_id)
            .await
            .or_not_found("組織")?;

        let profile = UserProfile::new(NewUserProfile {
            id:         UserId::new(),
            tenant_id:  organization.id().clone(),
            email:      Email::new(input.email)?,
            name:       UserName::new(input.name)?,
            role:       UserRole::Employee,
            status:     UserStatus::Pending,
            department: input.department,
            now:        self.clock.now(),
        });

        let mut tx = begin_tx(self.tx_manager.as_ref()).await?;
        self.profile_repo.insert(&mut tx, &profile).await?;
        commit_tx(tx).await?;

        log_business_event!(
            event.category = event::category::USER,
            event.action = event::action::USER_REGISTERED,
            event.entity_type = event::entity_type::USER,
            event.entity_id = %profile.id(),
            event.tenant_id = %profile.tenant_id(),
            event.result = event::result::SUCCESS,
            "従業員の自己登録"
        );

        let admins = match self
            .profile_repo
            .find_by_tenant_and_role(profile.tenant_id(), UserRole::Admin)
            .await
        {
            Ok(admins) => admins,
            Err(e) => {
                tracing::error!(
                    error.category = log_error::category::INFRASTRUCTURE,
                    error.kind = log_error::kind::RECIPIENT_LOOKUP,
                    error = %e,
                    tenant_id = %profile.tenant_id(),
                    "管理者の取得に失敗したため登録通知を送らない"
                );
                Vec::new()
            }
        };
        let events = recipient::for_user_registered(&admins)
            .into_iter()
            .map(|admin_id| {
                NotificationEvent::new(
                    admin_id,
                    profile.tenant_id().clone(),
                    NotificationPayload::NewUserPending {
                        new_user_name: profile.name().as_str().to_string(),
                    },
                )
            })
            .collect();
        self.dispatcher.notify_all(events).await;

        Ok(profile)
    }

    /// 承認待ちのユーザーを承認する
    pub async fn approve_user(&self, input: ApproveUserInput) -> Result<UserProfile, CoreError> {
        self.require_admin(&input.actor_id, &input.tenant_id).await?;
        let profile = self.find_member(&input.user_id, &input.tenant_id).await?;
        let approved = profile.approve()?;

        let mut tx = begin_tx(self.tx_manager.as_ref()).await?;
        self.profile_repo.update(&mut tx, &approved).await?;
        commit_tx(tx).await?;

        log_business_event!(
            event.category = event::category::USER,
            event.action = event::action::USER_APPROVED,
            event.entity_type = event::entity_type::USER,
            event.entity_id = %approved.id(),
            event.actor_id = %input.actor_id,
            event.tenant_id = %approved.tenant_id(),
            event.result = event::result::SUCCESS,
            "ユーザー承認"
        );

        self.dispatcher
            .notify(NotificationEvent::new(
                approved.id().clone(),
                approved.tenant_id().clone(),
                NotificationPayload::UserApproved,
            ))
            .await;

        Ok(approved)
    }

    /// ロールと部署を変更する
    ///
    /// 実際に変更があった場合のみ保存し、本人に通知する。
    pub async fn update_user_profile(
        &self,
        input: UpdateUserProfileInput,
    ) -> Result<UserProfile, CoreError> {
        self.require_admin(&input.actor_id, &input.tenant_id).await?;
        let profile = self.find_member(&input.user_id, &input.tenant_id).await?;

        let (updated, changed) = profile.reassign(input.role, input.department);
        if !changed {
            return Ok(updated);
        }

        let mut tx = begin_tx(self.tx_manager.as_ref()).await?;
        self.profile_repo.update(&mut tx, &updated).await?;
        commit_tx(tx).await?;

        log_business_event!(
            event.category = event::category::USER,
            event.action = event::action::USER_PROFILE_UPDATED,
            event.entity_type = event::entity_type::USER,
            event.entity_id = %updated.id(),
            event.actor_id = %input.actor_id,
            event.tenant_id = %updated.tenant_id(),
            event.result = event::result::SUCCESS,
            user.role = %updated.role(),
            "ユーザーのロール・部署を変更"
        );

        self.dispatcher
            .notify(NotificationEvent::new(
                updated.id().clone(),
                updated.tenant_id().clone(),
                NotificationPayload::UserProfileUpdated,
            ))
            .await;

        Ok(updated)
    }

    /// 本人のメール通知設定を置き換える
    pub async fn update_notification_preferences(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
        preferences: NotificationPreferences,
    ) -> Result<UserProfile, CoreError> {
        let profile = self.find_member(user_id, tenant_id).await?;
        let updated = profile.with_notification_preferences(preferences);

        let mut tx = begin_tx(self.tx_manager.as_ref()).await?;
        self.profile_repo.update(&mut tx, &updated).await?;
        commit_tx(tx).await?;

        log_business_event!(
            event.category = event::category::USER,
            event.action = event::action::PREFERENCES_UPDATED,
            event.entity_type = event::entity_type::USER,
            event.entity_id = %updated.id(),
            event.actor_id = %updated.id(),
            event.tenant_id = %updated.tenant_id(),
            event.result = event::result::SUCCESS,
            "通知設定を更新"
        );

        Ok(updated)
    }

    /// 管理者が選んだユーザーにカスタムメールを送る
    ///
    /// 宛先の解決に失敗したユーザー（存在しない・他テナント・取得エラー）は
    /// ログに残して飛ばす。送信は宛先ごとに独立し、結果をまとめて返す。
    pub async fn send_custom_email(
        &self,
        input: SendCustomEmailInput,
    ) -> Result<CustomEmailReport, CoreError> {
        self.require_admin(&input.actor_id, &input.tenant_id).await?;
        if input.recipient_ids.is_empty() {
            return Err(CoreError::BadRequest(
                "宛先を 1 人以上選択してください".to_string(),
            ));
        }
        if input.subject.trim().is_empty() {
            return Err(CoreError::BadRequest("件名は必須です".to_string()));
        }

        let organization = self
            .organization_repo
            .find_by_id(&input.tenant_id)
            .await
            .or_not_found("組織")?;

        let mut addresses = Vec::with_capacity(input.recipient_ids.len());
        for user_id in &input.recipient_ids {
            match self.find_member(user_id, &input.tenant_id).await {
                Ok(profile) => addresses.push(profile.email().as_str().to_string()),
                Err(e) => tracing::warn!(
                    error.category = log_error::category::INFRASTRUCTURE,
                    error.kind = log_error::kind::RECIPIENT_LOOKUP,
                    error = %e,
                    %user_id,
                    tenant_id = %input.tenant_id,
                    "宛先のメールアドレスを取得できないため飛ばす"
                ),
            }
        }

        let report = self
            .mailer
            .send_custom_email(&organization, &addresses, &input.subject, &input.body)
            .await;

        let result = if report.failed.is_empty() {
            event::result::SUCCESS
        } else {
            event::result::FAILURE
        };
        log_business_event!(
            event.category = event::category::NOTIFICATION,
            event.action = event::action::CUSTOM_EMAIL_SENT,
            event.actor_id = %input.actor_id,
            event.tenant_id = %input.tenant_id,
            event.result = result,
            email.sent = report.sent.len(),
            email.failed = report.failed.len(),
            "カスタムメール送信"
        );

        Ok(report)
    }

    async fn find_member(
        &self,
        user_id: &UserId,
        tenant_id: &TenantId,
    ) -> Result<UserProfile, CoreError> {
        let profile = self
            .profile_repo
            .find_by_id(user_id)
            .await
            .or_not_found("ユーザー")?;
        // 他テナントのユーザーは存在しないものとして扱う
        if profile.tenant_id() != tenant_id {
            return Err(CoreError::NotFound("ユーザーが見つかりません".to_string()));
        }
        Ok(profile)
    }

    async fn require_admin(
        &self,
        actor_id: &UserId,
        tenant_id: &TenantId,
    ) -> Result<(), CoreError> {
        let actor = self.find_member(actor_id, tenant_id).await?;
        if !actor.is_admin() {
            return Err(CoreError::Forbidden(
                "この操作には管理者権限が必要です".to_string(),
            ));
        }
        Ok(())
    }
}
