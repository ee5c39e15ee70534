use alloy_sol_types::sol;

sol! {
    #[sol(rpc)]
    interface IStreamToken {
        function balanceOf(address owner) external view returns (uint256);

        function allowance(address owner, address spender) external view returns (uint256);

        function approve(address spender, uint256 amount) external returns (bool);
    }
}

sol! {
    #[derive(Debug)]
    event Transfer(address indexed from, address indexed to, uint256 value);

    #[derive(Debug)]
    event Approval(address indexed owner, address indexed spender, uint256 value);
}
